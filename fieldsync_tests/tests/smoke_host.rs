use std::time::Duration;

use fieldsync_host::server::bind_ephemeral;
use fieldsync_shared::{
    frontend::{draw_frame, WorldView},
    input::ScriptedInput,
    math::Vec2,
    render::NullRenderer,
    world::PlayerId,
};

/// Smoke test: host accept loop runs while its own player is driven through the authority.
#[tokio::test]
async fn host_runs_with_local_player() -> anyhow::Result<()> {
    let (mut server, _cfg) = bind_ephemeral().await?;
    let world = server.world();
    let accept = tokio::spawn(async move { server.run().await });

    let mut input = ScriptedInput::new([Vec2::new(1.0, 1.0), Vec2::new(2.0, 3.0)]);
    let mut renderer = NullRenderer;
    for _ in 0..3 {
        draw_frame(&world, PlayerId::HOST, &mut input, &mut renderer, 0.016).await?;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let snapshot = WorldView::snapshot(&world).await?;
    assert_eq!(snapshot.player(PlayerId::HOST).position(), Vec2::new(2.0, 3.0));
    assert!(!accept.is_finished());
    accept.abort();
    Ok(())
}
