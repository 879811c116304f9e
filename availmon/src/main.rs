fn main() -> failure::Fallible<()> {
    availmon::run()
}
