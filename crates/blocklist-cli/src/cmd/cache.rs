//! `blk cache`: explicit population, inspection, and invalidation.
//!
//! Subcommands:
//! - `blk cache warm <subject> --direction D [--ttl SECS]`: recompute from the store
//! - `blk cache show <subject> --direction D`: cached set, empty when absent
//! - `blk cache clear <subject> --direction D`: drop the entry
//! - `blk cache purge`: delete every expired entry

use std::time::Duration;

use blocklist_core::{BlockError, Direction, IdSet};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cmd::Context;
use crate::output::{join_ids, render};

// ---------------------------------------------------------------------------
// Clap types
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    #[command(
        about = "Populate a subject's cache entry from the store",
        after_help = "EXAMPLES:\n    # Cache who 42 blocks for ten minutes\n    blk cache warm 42 --ttl 600"
    )]
    Warm(CacheWarmArgs),

    #[command(about = "Print a subject's cached set (empty when not cached)")]
    Show(CacheSlotArgs),

    #[command(about = "Drop a subject's cache entry")]
    Clear(CacheSlotArgs),

    #[command(about = "Delete every expired cache entry")]
    Purge,
}

#[derive(Args, Debug)]
pub struct CacheSlotArgs {
    /// Subject user.
    pub subject: String,

    /// Which of the subject's two entries.
    #[arg(long, short = 'd', default_value = "blocking")]
    pub direction: Direction,
}

#[derive(Args, Debug)]
pub struct CacheWarmArgs {
    #[command(flatten)]
    pub slot: CacheSlotArgs,

    /// Entry lifetime in seconds; defaults to `cache.ttl_secs`.
    #[arg(long, value_name = "SECS")]
    pub ttl: Option<u64>,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CacheOutput {
    action: &'static str,
    subject: u64,
    direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    ids: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
struct PurgeOutput {
    action: &'static str,
    purged: usize,
}

fn to_raw(ids: &IdSet) -> Vec<u64> {
    ids.iter().map(|id| id.get()).collect()
}

// ---------------------------------------------------------------------------
// Command runners
// ---------------------------------------------------------------------------

pub fn run_cache(args: &CacheArgs, ctx: &Context) -> anyhow::Result<()> {
    match &args.command {
        CacheCommand::Warm(a) => run_warm(a, ctx),
        CacheCommand::Show(a) => run_show(a, ctx),
        CacheCommand::Clear(a) => run_clear(a, ctx),
        CacheCommand::Purge => run_purge(ctx),
    }
}

fn run_warm(args: &CacheWarmArgs, ctx: &Context) -> anyhow::Result<()> {
    let subject = ctx.user(&args.slot.subject)?;
    let svc = ctx.open_service()?;
    let ttl = args.ttl.map(Duration::from_secs);

    let ids = match args.slot.direction {
        Direction::Blocking => svc.cache_blocking(subject, ttl),
        Direction::Blockers => svc.cache_blockers(subject, ttl),
    }
    .map_err(|e| ctx.fail(&e))?;

    let result = CacheOutput {
        action: "warm",
        subject: subject.get(),
        direction: args.slot.direction,
        ids: Some(to_raw(&ids)),
        ttl_secs: Some(ttl.unwrap_or(svc.config().cache_ttl_default).as_secs()),
    };
    render(ctx.output, &result, |r, w| {
        writeln!(
            w,
            "✓ cached {} {} ({} ids, ttl {}s)",
            r.subject,
            r.direction,
            r.ids.as_ref().map_or(0, Vec::len),
            r.ttl_secs.unwrap_or_default()
        )
    })
}

fn run_show(args: &CacheSlotArgs, ctx: &Context) -> anyhow::Result<()> {
    let subject = ctx.user(&args.subject)?;
    let svc = ctx.open_service()?;

    let ids = match args.direction {
        Direction::Blocking => svc.blocking_cache(subject),
        Direction::Blockers => svc.blockers_cache(subject),
    };
    if svc.cache_faults() > 0 {
        tracing::warn!(faults = svc.cache_faults(), "cache read failed; showing empty set");
    }

    let result = CacheOutput {
        action: "show",
        subject: subject.get(),
        direction: args.direction,
        ids: Some(to_raw(&ids)),
        ttl_secs: None,
    };
    render(ctx.output, &result, |r, w| {
        writeln!(w, "{}", join_ids(r.ids.iter().flatten()))
    })
}

fn run_clear(args: &CacheSlotArgs, ctx: &Context) -> anyhow::Result<()> {
    let subject = ctx.user(&args.subject)?;
    let svc = ctx.open_service()?;

    match args.direction {
        Direction::Blocking => svc.clear_blocking_cache(subject),
        Direction::Blockers => svc.clear_blockers_cache(subject),
    }
    .map_err(|e| ctx.fail(&e))?;

    let result = CacheOutput {
        action: "clear",
        subject: subject.get(),
        direction: args.direction,
        ids: None,
        ttl_secs: None,
    };
    render(ctx.output, &result, |r, w| {
        writeln!(w, "✓ cleared {} {}", r.subject, r.direction)
    })
}

fn run_purge(ctx: &Context) -> anyhow::Result<()> {
    let svc = ctx.open_service()?;
    let purged = svc
        .cache()
        .purge_expired()
        .map_err(|e| ctx.fail(&BlockError::from(e)))?;

    let result = PurgeOutput {
        action: "purge",
        purged,
    };
    render(ctx.output, &result, |r, w| {
        writeln!(w, "✓ purged {} expired entries", r.purged)
    })
}
