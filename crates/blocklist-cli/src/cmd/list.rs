//! `blk list`, `blk count`, `blk summary`: directional projections.


use blocklist_core::model::DEFAULT_PAGE_SIZE;
use blocklist_core::{BlockRecord, Direction, PageRequest, PageToken};
use clap::Args;
use serde::Serialize;

use crate::cmd::Context;
use crate::output::{join_ids, pretty_kv, pretty_section, render, render_mode};

/// Arguments for `blk list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Subject user.
    pub subject: String,

    /// `blocking` (who the subject blocks) or `blockers` (who blocks the subject).
    #[arg(long, short = 'd', default_value = "blocking")]
    pub direction: Direction,

    /// Return one page of this many identities instead of the full list.
    #[arg(long, value_name = "N")]
    pub page_size: Option<u32>,

    /// Resume after this cursor (from a previous page's `next`).
    #[arg(long, value_name = "TOKEN")]
    pub after: Option<PageToken>,

    /// Include the block timestamp for every edge.
    #[arg(long, conflicts_with_all = ["page_size", "after"])]
    pub records: bool,
}

/// Arguments for `blk count` and `blk summary`.
#[derive(Args, Debug)]
pub struct SubjectArgs {
    /// Subject user.
    pub subject: String,
}

#[derive(Debug, Serialize)]
struct ListOutput {
    subject: u64,
    direction: Direction,
    ids: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next: Option<String>,
}

#[derive(Debug, Serialize)]
struct RecordsOutput {
    subject: u64,
    direction: Direction,
    records: Vec<BlockRecord>,
}

#[derive(Debug, Serialize)]
struct CountOutput {
    subject: u64,
    blocking: u64,
    blockers: u64,
}

#[derive(Debug, Serialize)]
struct SummaryOutput {
    subject: u64,
    blocking: Vec<u64>,
    blockers: Vec<u64>,
}

pub fn run_list(args: &ListArgs, ctx: &Context) -> anyhow::Result<()> {
    let subject = ctx.user(&args.subject)?;
    let svc = ctx.open_service()?;

    if args.records {
        let records = match args.direction {
            Direction::Blocking => svc.blocking_records(subject),
            Direction::Blockers => svc.blocker_records(subject),
        }
        .map_err(|e| ctx.fail(&e))?;
        let result = RecordsOutput {
            subject: subject.get(),
            direction: args.direction,
            records,
        };
        return render(ctx.output, &result, |r, w| {
            for record in &r.records {
                writeln!(w, "{}\t{}", record.edge, format_us(record.created_at_us))?;
            }
            Ok(())
        });
    }

    let (ids, next) = if args.page_size.is_some() || args.after.is_some() {
        let size = args.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        let request = args
            .after
            .map_or_else(|| PageRequest::first(size), |token| PageRequest::after(token, size));
        let page = match args.direction {
            Direction::Blocking => svc.blocking_page(subject, request),
            Direction::Blockers => svc.blockers_page(subject, request),
        }
        .map_err(|e| ctx.fail(&e))?;
        (page.ids, page.next)
    } else {
        let ids = match args.direction {
            Direction::Blocking => svc.blocking_ids(subject),
            Direction::Blockers => svc.blockers_ids(subject),
        }
        .map_err(|e| ctx.fail(&e))?;
        (ids, None)
    };

    let result = ListOutput {
        subject: subject.get(),
        direction: args.direction,
        ids: ids.iter().map(|id| id.get()).collect(),
        next: next.map(|token| token.to_string()),
    };

    render(ctx.output, &result, |r, w| {
        for id in &r.ids {
            writeln!(w, "{id}")?;
        }
        if let Some(next) = &r.next {
            writeln!(w, "next: {next}")?;
        }
        Ok(())
    })
}

pub fn run_count(args: &SubjectArgs, ctx: &Context) -> anyhow::Result<()> {
    let subject = ctx.user(&args.subject)?;
    let svc = ctx.open_service()?;

    let result = CountOutput {
        subject: subject.get(),
        blocking: svc.blocking_count(subject).map_err(|e| ctx.fail(&e))?,
        blockers: svc.blockers_count(subject).map_err(|e| ctx.fail(&e))?,
    };

    render(ctx.output, &result, |r, w| {
        writeln!(w, "blocking\t{}", r.blocking)?;
        writeln!(w, "blockers\t{}", r.blockers)
    })
}

pub fn run_summary(args: &SubjectArgs, ctx: &Context) -> anyhow::Result<()> {
    let subject = ctx.user(&args.subject)?;
    let svc = ctx.open_service()?;
    let summary = svc
        .blocking_and_blockers_ids(subject)
        .map_err(|e| ctx.fail(&e))?;

    let result = SummaryOutput {
        subject: subject.get(),
        blocking: summary.blocking.iter().map(|id| id.get()).collect(),
        blockers: summary.blockers.iter().map(|id| id.get()).collect(),
    };

    render_mode(
        ctx.output,
        &result,
        |r, w| {
            writeln!(w, "blocking\t{}", join_ids(&r.blocking))?;
            writeln!(w, "blockers\t{}", join_ids(&r.blockers))
        },
        |r, w| {
            pretty_section(w, &format!("User {}", r.subject))?;
            pretty_kv(w, "blocking", join_ids(&r.blocking))?;
            pretty_kv(w, "blocked by", join_ids(&r.blockers))
        },
    )
}

/// Render a microsecond Unix timestamp as RFC 3339, or the raw number if it
/// is out of range.
pub fn format_us(us: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_micros(us)
        .map_or_else(|| us.to_string(), |ts| ts.to_rfc3339())
}
