use crate::core::config::data::{Config, ConfigKey};

impl Config {
    /// Effective configuration as printable lines, defaults marked.
    pub fn summary(&self) -> String {
        let mut out = String::from("Current configuration:\n");
        for key in ConfigKey::ALL {
            let (value, explicit) = self.effective_value(key);
            if explicit {
                out.push_str(&format!("  {}: {value}\n", key.name()));
            } else {
                out.push_str(&format!("  {}: {value} (default)\n", key.name()));
            }
        }
        out
    }

    pub fn print_all(&self) {
        print!("{}", self.summary());
    }
}
