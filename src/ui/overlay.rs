//! Annotation link overlay.
//!
//! Comment-to-node links are drawn as curved paths on their own layer. The
//! paths are recomputed by a redraw pass that is scheduled rather than run on
//! every mutation: any number of [`AnnotationOverlay::schedule`] calls within a
//! frame collapse into one pass at the start of the next canvas draw.
//!
//! The pass first prunes links whose endpoints are no longer rendered, then
//! rebuilds one path per remaining link.

use super::hit::NodeLayout;
use crate::constants::ANNOTATION_CURVE_BEND;
use crate::store::GraphStore;
use crate::types::NodeId;
use eframe::egui::{vec2, Pos2};
use log::debug;
use std::collections::BTreeMap;

/// One drawn annotation link, in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationPath {
    /// Derived link id, `annotation_{comment}_{target}`
    pub link_id: String,
    /// Comment end
    pub comment: NodeId,
    /// Annotated node
    pub target: NodeId,
    /// Quadratic curve: start, control, end
    pub points: [Pos2; 3],
}

/// Quadratic curve between two centres, bent by a perpendicular control point.
pub fn annotation_curve(from: Pos2, to: Pos2) -> [Pos2; 3] {
    let delta = to - from;
    let normal = vec2(-delta.y, delta.x);
    let control = from + delta * 0.5 + normal * ANNOTATION_CURVE_BEND;
    [from, control, to]
}

/// Scheduled redraw state for annotation paths.
#[derive(Debug, Default)]
pub struct AnnotationOverlay {
    scheduled: bool,
    passes: u64,
    paths: Vec<AnnotationPath>,
}

impl AnnotationOverlay {
    /// Requests a redraw pass before the next paint.
    pub fn schedule(&mut self) {
        self.scheduled = true;
    }

    /// Whether a pass is pending.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// Number of passes run so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// The paths computed by the last pass.
    pub fn paths(&self) -> &[AnnotationPath] {
        &self.paths
    }

    /// Runs the pending pass against the rendered node layouts.
    ///
    /// Returns whether a pass ran.
    pub fn run(&mut self, store: &mut GraphStore, rendered: &BTreeMap<NodeId, NodeLayout>) -> bool {
        if !self.scheduled {
            return false;
        }
        self.scheduled = false;
        self.passes += 1;

        let pruned = store.prune_dangling_links(|id| rendered.contains_key(id));
        if pruned > 0 {
            debug!("annotation pass pruned {pruned} dangling link(s)");
        }

        self.paths.clear();
        for (comment, links) in store.annotation_links() {
            let Some(from) = rendered.get(comment) else {
                continue;
            };
            for link in links {
                let Some(to) = rendered.get(&link.target_id) else {
                    continue;
                };
                self.paths.push(AnnotationPath {
                    link_id: link.link_id.clone(),
                    comment: comment.clone(),
                    target: link.target_id.clone(),
                    points: annotation_curve(from.center(), to.center()),
                });
            }
        }
        true
    }
}
