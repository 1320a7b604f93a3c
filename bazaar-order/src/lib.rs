pub mod analytics;
pub mod creation;
pub mod listing;
pub mod manager;
pub mod policy;
pub mod returns;
pub mod service;
pub mod tracking;
pub mod transitions;

pub use analytics::{Analytics, DailyRevenue, DashboardStats, OrderSummary, TopProduct};
pub use creation::{NewOrder, NewOrderItem};
pub use listing::OrderPage;
pub use manager::{OrderManager, PaymentUpdate, TransitionOutcome};
pub use policy::FulfillmentPolicy;
pub use returns::{NewReturn, ReturnUpdate, ReturnWorkflow};
pub use service::OrderService;
pub use tracking::{OrderView, TrackingStep};
pub use transitions::{plan, StockEffect, TransitionPlan};
