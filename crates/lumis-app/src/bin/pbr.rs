use lumis_app::scenes::pbr::PbrScene;

fn main() -> anyhow::Result<()> {
    lumis_app::run_scene(Box::new(PbrScene::new()))
}
