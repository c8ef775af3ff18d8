//! `blk block`, `blk unblock`, `blk toggle`: mutate one ordered pair.


use clap::Args;
use serde::Serialize;

use crate::cmd::Context;
use crate::output::render;

/// Arguments shared by the three mutation commands.
#[derive(Args, Debug)]
pub struct PairArgs {
    /// The acting user (the blocker).
    pub actor: String,

    /// The user being blocked or unblocked.
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Block,
    Unblock,
    Toggle,
}

impl Mutation {
    const fn name(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Unblock => "unblock",
            Self::Toggle => "toggle",
        }
    }
}

#[derive(Debug, Serialize)]
struct MutationOutput {
    action: &'static str,
    actor: u64,
    target: u64,
    /// Whether this call changed the stored state.
    changed: bool,
    /// Whether `actor` blocks `target` after the call.
    blocking: bool,
}

pub fn run_mutation(mutation: Mutation, args: &PairArgs, ctx: &Context) -> anyhow::Result<()> {
    let actor = ctx.user(&args.actor)?;
    let target = ctx.user(&args.target)?;
    let svc = ctx.open_service()?;

    let (changed, blocking) = match mutation {
        Mutation::Block => {
            let changed = svc.block(actor, target).map_err(|e| ctx.fail(&e))?;
            (changed, actor != target)
        }
        Mutation::Unblock => {
            let changed = svc.unblock(actor, target).map_err(|e| ctx.fail(&e))?;
            (changed, false)
        }
        Mutation::Toggle => {
            let before = svc.is_blocking(actor, target).map_err(|e| ctx.fail(&e))?;
            let now = svc.toggle_block(actor, target).map_err(|e| ctx.fail(&e))?;
            (before != now, now)
        }
    };

    let result = MutationOutput {
        action: mutation.name(),
        actor: actor.get(),
        target: target.get(),
        changed,
        blocking,
    };

    render(ctx.output, &result, |r, w| {
        let state = if r.blocking { "blocks" } else { "does not block" };
        if r.changed {
            writeln!(w, "✓ {} {state} {}", r.actor, r.target)
        } else {
            writeln!(w, "no change: {} {state} {}", r.actor, r.target)
        }
    })
}
