use lumis_app::scenes::octree::OctreeScene;

fn main() -> anyhow::Result<()> {
    lumis_app::run_scene(Box::new(OctreeScene::new()))
}
