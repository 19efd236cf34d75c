use lumis_app::scenes::boids::BoidsScene;

fn main() -> anyhow::Result<()> {
    lumis_app::run_scene(Box::new(BoidsScene::new()))
}
