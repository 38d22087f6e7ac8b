//! Loads a tree file and ticks the `main` tree until it settles.
//!
//! ```text
//! cargo run --example from_file -- demos/guard.yaml
//! ```

use ::behavior_tree_runner::{load_str, Context, TreeEnv, TreeRunner, TreeStatus};
use std::{fs, rc::Rc};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::DEBUG.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/guard.yaml".to_owned());
    let file = fs::read_to_string(&path)?;

    let ctx = Rc::new(Context::default());
    let tree = Rc::new(load_str(&file, &ctx, "main", true)?);
    let mut runner = TreeRunner::new(tree, TreeEnv::new(ctx.clone()).with_debug(true));

    let mut ticks = 0;
    let status = loop {
        ticks += 1;
        match runner.run() {
            TreeStatus::Running => ctx.advance(0.25),
            status => break status,
        }
    };

    eprintln!("{:?} after {} ticks, hp = {:?}", status, ticks, runner.env().get("hp"));
    Ok(())
}
