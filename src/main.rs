fn main() -> Result<(), Box<dyn std::error::Error>> {
    chatpace::cli::main()
}
