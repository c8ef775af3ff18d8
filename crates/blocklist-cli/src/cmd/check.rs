//! `blk check A B`: every membership answer for one pair.


use serde::Serialize;

use crate::cmd::Context;
use crate::cmd::block::PairArgs;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Debug, Serialize)]
struct CheckOutput {
    a: u64,
    b: u64,
    /// `a -> b` exists.
    is_blocking: bool,
    /// `b -> a` exists.
    is_blocked_by: bool,
    has_block: bool,
    mutual: bool,
}

pub fn run_check(args: &PairArgs, ctx: &Context) -> anyhow::Result<()> {
    let a = ctx.user(&args.actor)?;
    let b = ctx.user(&args.target)?;
    let svc = ctx.open_service()?;

    let is_blocking = svc.is_blocking(a, b).map_err(|e| ctx.fail(&e))?;
    let is_blocked_by = svc.is_blocked_by(a, b).map_err(|e| ctx.fail(&e))?;
    let result = CheckOutput {
        a: a.get(),
        b: b.get(),
        is_blocking,
        is_blocked_by,
        has_block: svc.has_block_with(a, b).map_err(|e| ctx.fail(&e))?,
        mutual: svc.is_mutually_blocking(a, b).map_err(|e| ctx.fail(&e))?,
    };

    render_mode(
        ctx.output,
        &result,
        |r, w| {
            writeln!(w, "is_blocking\t{}", r.is_blocking)?;
            writeln!(w, "is_blocked_by\t{}", r.is_blocked_by)?;
            writeln!(w, "has_block\t{}", r.has_block)?;
            writeln!(w, "mutual\t{}", r.mutual)
        },
        |r, w| {
            pretty_section(w, &format!("{} and {}", r.a, r.b))?;
            pretty_kv(w, &format!("{} blocks {}", r.a, r.b), yes_no(r.is_blocking))?;
            pretty_kv(w, &format!("{} blocks {}", r.b, r.a), yes_no(r.is_blocked_by))?;
            pretty_kv(w, "mutual", yes_no(r.mutual))
        },
    )
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
