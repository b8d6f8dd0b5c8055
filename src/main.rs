fn main() -> anyhow::Result<()> {
    cabflow::run()
}
