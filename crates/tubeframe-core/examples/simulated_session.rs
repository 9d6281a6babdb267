//! Simulated player session
//!
//! Drives a player through mount, updates, a container swap and unmount
//! against the in-memory runtime, printing the calls each step produced.
//!
//! Run with: RUST_LOG=tubeframe_core=debug cargo run -p tubeframe-core --example simulated_session

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tubeframe_core::{
    sim::{SimPlayer, SimRuntime, SimScriptHost},
    Container, Description, HandlerSlot, PlayerFactory, PlayerLifecycle, PlayerState, SdkConfig,
    SdkLoader,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    tubeframe_core::init();

    println!("Tubeframe Core - Simulated Session");
    println!("==================================\n");

    let runtime = Arc::new(SimRuntime::new());
    let host = Arc::new(SimScriptHost::new(runtime.clone()));
    let loader = SdkLoader::global(host.clone(), SdkConfig::default());
    let player = PlayerLifecycle::new(PlayerFactory::new(loader));

    let base = || {
        Description::new()
            .on(HandlerSlot::Ready, |_| println!("  [event] ready"))
            .on(HandlerSlot::StateChange, |event| {
                println!("  [event] state change: {:?}", event.data)
            })
    };

    println!("Mount:");
    player
        .mount(
            Container::new("player"),
            base().video("dQw4w9WgXcQ").volume(0.8),
        )
        .await?;
    print_calls(&runtime.last_player(), 0);

    println!("\nPause and mute:");
    let seen = calls_so_far(&runtime);
    player
        .update(base().video("dQw4w9WgXcQ").volume(0.8).paused(true).muted(true))
        .await?;
    print_calls(&runtime.last_player(), seen);

    println!("\nSwitch video while paused:");
    let seen = calls_so_far(&runtime);
    player
        .update(
            base()
                .video("M7lc1UVf-VE")
                .volume(0.8)
                .paused(true)
                .muted(true)
                .start_seconds(30.0),
        )
        .await?;
    print_calls(&runtime.last_player(), seen);

    if let Some(sim) = runtime.last_player() {
        sim.emit_state(PlayerState::Cued);
    }

    println!("\nMove to another container:");
    player.set_container(Container::new("sidebar")).await?;
    for (index, sim) in runtime.players().iter().enumerate() {
        println!(
            "  player #{index}: container={:?} destroyed={}",
            sim.container().map(|c| c.id()),
            sim.is_destroyed()
        );
    }

    println!("\nUnmount:");
    player.unmount();
    println!("  state: {}", player.state());
    println!("  script insertions: {}", host.script_insertions());

    Ok(())
}

fn calls_so_far(runtime: &SimRuntime) -> usize {
    runtime
        .last_player()
        .map(|sim| sim.calls().len())
        .unwrap_or(0)
}

fn print_calls(sim: &Option<Arc<SimPlayer>>, skip: usize) {
    let Some(sim) = sim else {
        println!("  (no player)");
        return;
    };
    let calls = sim.calls();
    if calls.len() <= skip {
        println!("  (no calls)");
    }
    for call in calls.iter().skip(skip) {
        println!("  {call:?}");
    }
}
