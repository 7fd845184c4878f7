// Guided "declare surplus material" flow tasks
pub mod condition;
pub mod declaration_summary;
pub mod location;
pub mod material_type;
pub mod open_chat;
pub mod quantity;
pub mod triage;

// Shared modules
pub mod types;

// Re-export task implementations
pub use condition::ConditionTask;
pub use declaration_summary::DeclarationSummaryTask;
pub use location::LocationTask;
pub use material_type::MaterialTypeTask;
pub use open_chat::OpenChatTask;
pub use quantity::QuantityTask;
pub use triage::TriageTask;

// Re-export session keys
pub use types::session_keys;

use std::any::type_name;
use std::sync::Arc;

use dialogue_flow::{Flow, FlowBuilder};

use crate::completion::CompletionClient;

/// Assemble the support dialogue flow.
///
/// Triage is the start task and the hub: open conversation follows the
/// default edge, the guided declaration steps are strictly linear, and both
/// the summary and the open chat hand the session back to triage.
pub fn build_support_flow(completion: Arc<CompletionClient>) -> Flow {
    let triage_id = type_name::<TriageTask>().to_string();
    let open_chat_id = type_name::<OpenChatTask>().to_string();
    let material_id = type_name::<MaterialTypeTask>().to_string();
    let quantity_id = type_name::<QuantityTask>().to_string();
    let condition_id = type_name::<ConditionTask>().to_string();
    let location_id = type_name::<LocationTask>().to_string();
    let summary_id = type_name::<DeclarationSummaryTask>().to_string();

    FlowBuilder::new("support_chat")
        .add_task(Arc::new(TriageTask))
        .add_task(Arc::new(OpenChatTask::new(completion)))
        .add_task(Arc::new(MaterialTypeTask))
        .add_task(Arc::new(QuantityTask))
        .add_task(Arc::new(ConditionTask))
        .add_task(Arc::new(LocationTask))
        .add_task(Arc::new(DeclarationSummaryTask))
        .add_edge(triage_id, open_chat_id)
        .add_edge(material_id, quantity_id.clone())
        .add_edge(quantity_id, condition_id.clone())
        .add_edge(condition_id, location_id.clone())
        .add_edge(location_id, summary_id)
        .build()
}
