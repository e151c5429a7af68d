mod history;
mod ids;
mod projection;
mod years;

pub use history::{DemandPoint, HistoricalObservation, HistorySnapshot, SeriesPoint, gwh_to_twh};
pub use ids::ModelId;
pub use projection::{ProjectionKey, ScenarioProjection};
pub use years::YearRange;
