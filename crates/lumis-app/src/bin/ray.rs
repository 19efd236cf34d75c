use lumis_app::scenes::ray::RayScene;

fn main() -> anyhow::Result<()> {
    lumis_app::run_scene(Box::new(RayScene::new()))
}
