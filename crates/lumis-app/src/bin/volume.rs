use lumis_app::scenes::volume::VolumeScene;

fn main() -> anyhow::Result<()> {
    lumis_app::run_scene(Box::new(VolumeScene::new()))
}
