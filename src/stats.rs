//! Dashboard figures over a set of shipments.
use crate::shipment::{Shipment, Status};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetStats {
    pub total: usize,
    pub pending: usize,
    pub en_route: usize,
    pub delivered: usize,
    pub canceled: usize,
    pub ratings: usize,
    pub average_rating: Option<f64>,
    /// `rating_distribution[i]` counts ratings of `i + 1` stars.
    pub rating_distribution: [usize; 5],
}

impl FleetStats {
    /// Canceled shipments count only towards `canceled`, whatever their
    /// frozen status.
    pub fn collect<'a>(shipments: impl IntoIterator<Item = &'a Shipment>) -> Self {
        let mut stats = FleetStats::default();
        let mut stars_total = 0u64;

        for shipment in shipments {
            stats.total += 1;
            if shipment.is_canceled() {
                stats.canceled += 1;
            } else {
                match shipment.status() {
                    Status::Pending => stats.pending += 1,
                    Status::EnRoute => stats.en_route += 1,
                    Status::Delivered => stats.delivered += 1,
                }
            }
            if let Some(stars @ 1..=5) = shipment.rating() {
                stats.ratings += 1;
                stats.rating_distribution[usize::from(stars) - 1] += 1;
                stars_total += u64::from(stars);
            }
        }

        if stats.ratings > 0 {
            stats.average_rating = Some(stars_total as f64 / stats.ratings as f64);
        }
        stats
    }
}
