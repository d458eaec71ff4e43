fn main() -> anyhow::Result<()> {
    reelview_lib::run()
}
