fn main() {
    area400_analysis::cli::run();
}
