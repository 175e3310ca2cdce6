use crate::models::Device;

/// Push addresses to notify for a set of changed queues
///
/// Ordered by changed queue first, then by device list order. A device that
/// watches a queue listed twice is returned twice.
pub fn plan_notifications(changed_queues: &[String], devices: &[Device]) -> Vec<String> {
    changed_queues
        .iter()
        .flat_map(|queue| {
            devices
                .iter()
                .filter(move |device| &device.watched_queue == queue)
                .map(|device| device.push_address.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeviceType;

    fn device(uuid: &str, queue: &str) -> Device {
        Device {
            device_uuid: uuid.to_string(),
            device_type: DeviceType::Web,
            push_address: format!("token-{}", uuid),
            watched_queue: queue.to_string(),
            device_details: None,
        }
    }

    fn queues(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_only_watchers_of_changed_queues() {
        let devices = vec![device("a", "1/1"), device("b", "2/1"), device("c", "1/1")];
        let planned = plan_notifications(&queues(&["1/1"]), &devices);
        assert_eq!(planned, vec!["token-a", "token-c"]);
    }

    #[test]
    fn test_order_follows_changed_queues_then_devices() {
        let devices = vec![device("a", "1/1"), device("b", "2/1"), device("c", "1/1")];
        let planned = plan_notifications(&queues(&["2/1", "1/1"]), &devices);
        assert_eq!(planned, vec!["token-b", "token-a", "token-c"]);
    }

    #[test]
    fn test_nothing_changed_or_nobody_watching() {
        let devices = vec![device("a", "1/1")];
        assert!(plan_notifications(&[], &devices).is_empty());
        assert!(plan_notifications(&queues(&["6/2"]), &devices).is_empty());
        assert!(plan_notifications(&queues(&["1/1"]), &[]).is_empty());
    }

    #[test]
    fn test_repeated_queue_is_not_deduplicated() {
        let devices = vec![device("a", "3/2")];
        let planned = plan_notifications(&queues(&["3/2", "3/2"]), &devices);
        assert_eq!(planned, vec!["token-a", "token-a"]);
    }
}
