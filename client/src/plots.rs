use std::collections::HashMap;

use plotcanvas_shared::{Plot, PlotId, PlotMetaUpdate, PlotView};

/// Confirmed plots known to this client.
///
/// Fed by acks, remote plot events and list responses; never holds drafts.
#[derive(Debug, Default)]
pub struct PlotStore {
    plots: HashMap<PlotId, Plot>,
    generation: u64,
}

impl PlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.plots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plots.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, id: PlotId) -> Option<&Plot> {
        self.plots.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plot> {
        self.plots.values()
    }

    /// Insert or replace. An older copy never overwrites a newer one.
    pub fn upsert(&mut self, plot: Plot) -> bool {
        if let Some(existing) = self.plots.get(&plot.id) {
            if existing.updated_at > plot.updated_at || *existing == plot {
                return false;
            }
        }
        self.plots.insert(plot.id, plot);
        self.generation += 1;
        true
    }

    pub fn merge(&mut self, plots: impl IntoIterator<Item = Plot>) -> usize {
        let mut changed = 0;
        for plot in plots {
            if self.upsert(plot) {
                changed += 1;
            }
        }
        changed
    }

    pub fn remove(&mut self, id: PlotId) -> Option<Plot> {
        let removed = self.plots.remove(&id);
        if removed.is_some() {
            self.generation += 1;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.plots.clear();
        self.generation += 1;
    }

    /// Plots for a listing view. `Mine` is empty when signed out.
    pub fn list(&self, view: PlotView, user: Option<&str>) -> Vec<&Plot> {
        let mut plots: Vec<&Plot> = match view {
            PlotView::Mine => match user {
                Some(user) => self.plots.values().filter(|p| p.owner_id == user).collect(),
                None => return Vec::new(),
            },
            PlotView::Recent | PlotView::Top => self.plots.values().collect(),
        };
        match view {
            PlotView::Top => plots.sort_by(|a, b| {
                b.score
                    .cmp(&a.score)
                    .then(b.inserted_at.cmp(&a.inserted_at))
                    .then(b.id.cmp(&a.id))
            }),
            PlotView::Recent | PlotView::Mine => {
                plots.sort_by(|a, b| b.inserted_at.cmp(&a.inserted_at).then(b.id.cmp(&a.id)))
            }
        }
        plots
    }

    /// Topmost plot covering a world pixel; the newest wins where plots overlap.
    pub fn plot_at(&self, x: i32, y: i32) -> Option<&Plot> {
        self.plots
            .values()
            .filter(|plot| plot.polygon.contains_pixel(x, y))
            .max_by(|a, b| a.inserted_at.cmp(&b.inserted_at).then(a.id.cmp(&b.id)))
    }
}

/// Plot calls made over HTTP by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlotRequest {
    List {
        view: PlotView,
    },
    UpdateMeta {
        id: PlotId,
        name: String,
        description: String,
    },
    Delete {
        id: PlotId,
    },
}

impl PlotRequest {
    pub fn method(&self) -> &'static str {
        match self {
            Self::List { .. } => "GET",
            Self::UpdateMeta { .. } => "PATCH",
            Self::Delete { .. } => "DELETE",
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::List { view } => format!("/api/plots?view={}", view.as_str()),
            Self::UpdateMeta { id, .. } | Self::Delete { id } => format!("/api/plots/{id}"),
        }
    }

    /// JSON body, if the request carries one.
    pub fn body(&self) -> Option<String> {
        match self {
            Self::UpdateMeta {
                name, description, ..
            } => serde_json::to_string(&PlotMetaUpdate {
                name: name.clone(),
                description: description.clone(),
            })
            .ok(),
            Self::List { .. } | Self::Delete { .. } => None,
        }
    }
}
