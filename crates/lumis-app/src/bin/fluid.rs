use lumis_app::scenes::fluid::FluidScene;

fn main() -> anyhow::Result<()> {
    lumis_app::run_scene(Box::new(FluidScene::new()))
}
