use crate::model::Status;

/// Every transition the core is willing to perform automatically, consulted
/// by the report handler instead of an ad-hoc `match`. Cancellation is not
/// modeled here: CANCELED is reachable from any status except the sent-class
/// terminals, which `cancel` checks directly via `Status::is_sent_class`.
const TRANSITIONS: &[(Status, Status)] = &[
    (Status::Queued, Status::Accepted),
    (Status::Queued, Status::Canceled),
    (Status::Accepted, Status::Sent),
    (Status::Accepted, Status::Delivered),
    (Status::Accepted, Status::Received),
    (Status::Accepted, Status::Failed),
    (Status::Accepted, Status::Queued), // retry with room left
    (Status::Accepted, Status::Canceled),
    (Status::Sent, Status::Delivered),
    (Status::Sent, Status::Received),
];

pub fn allowed(from: Status, to: Status) -> bool {
    TRANSITIONS.contains(&(from, to))
}
