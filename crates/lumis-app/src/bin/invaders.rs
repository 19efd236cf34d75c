use lumis_app::scenes::invaders::InvadersScene;

fn main() -> anyhow::Result<()> {
    lumis_app::run_scene(Box::new(InvadersScene::new()))
}
