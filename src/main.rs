fn main() {
    std::process::exit(tickler::run());
}
