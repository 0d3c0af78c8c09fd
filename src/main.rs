fn main() {
    hub_mapper::cli::run();
}
