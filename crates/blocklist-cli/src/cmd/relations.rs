//! `blk relations A [B]`: the concrete edges behind a relationship.


use blocklist_core::{Edge, UserId};
use clap::Args;
use serde::Serialize;

use crate::cmd::Context;
use crate::cmd::list::format_us;
use crate::output::render;

/// Arguments for `blk relations`.
#[derive(Args, Debug)]
pub struct RelationsArgs {
    /// Subject user.
    pub subject: String,

    /// Restrict to edges between the subject and this user.
    pub other: Option<String>,
}

#[derive(Debug, Serialize)]
struct EdgeRow {
    blocker: UserId,
    blocked: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at_us: Option<i64>,
}

impl From<Edge> for EdgeRow {
    fn from(edge: Edge) -> Self {
        Self {
            blocker: edge.blocker,
            blocked: edge.blocked,
            created_at_us: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct RelationsOutput {
    subject: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    other: Option<u64>,
    edges: Vec<EdgeRow>,
}

pub fn run_relations(args: &RelationsArgs, ctx: &Context) -> anyhow::Result<()> {
    let subject = ctx.user(&args.subject)?;
    let other = args.other.as_deref().map(|raw| ctx.user(raw)).transpose()?;
    let svc = ctx.open_service()?;

    let edges: Vec<EdgeRow> = match other {
        Some(other) => svc
            .block_relationships_with(subject, other)
            .map_err(|e| ctx.fail(&e))?
            .into_iter()
            .map(EdgeRow::from)
            .collect(),
        None => svc
            .relationships_of(subject)
            .map_err(|e| ctx.fail(&e))?
            .into_iter()
            .map(|record| EdgeRow {
                created_at_us: Some(record.created_at_us),
                ..EdgeRow::from(record.edge)
            })
            .collect(),
    };

    let result = RelationsOutput {
        subject: subject.get(),
        other: other.map(UserId::get),
        edges,
    };

    render(ctx.output, &result, |r, w| {
        if r.edges.is_empty() {
            return writeln!(w, "no block relationships");
        }
        for edge in &r.edges {
            match edge.created_at_us {
                Some(us) => writeln!(w, "{} -> {}\t{}", edge.blocker, edge.blocked, format_us(us))?,
                None => writeln!(w, "{} -> {}", edge.blocker, edge.blocked)?,
            }
        }
        Ok(())
    })
}
