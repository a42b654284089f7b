mod common;

use common::strategies::*;
use proptest::prelude::*;
use queue_dispatch::constants::{is_fifo_queue, TRANSPORT_BATCH_LIMIT};
use queue_dispatch::messaging::producer::{build_batch_requests, build_send_request};
use queue_dispatch::messaging::ProducerError;
use queue_dispatch::registry::QueueBinding;

proptest! {
    /// Property: the ordered-queue suffix is recognised in any casing
    #[test]
    fn fifo_suffix_detected_case_insensitively(name in fifo_queue_name_strategy()) {
        prop_assert!(is_fifo_queue(&name));
    }

    /// Property: names without the suffix are standard queues
    #[test]
    fn standard_names_are_not_fifo(name in standard_queue_name_strategy()) {
        prop_assert!(!is_fifo_queue(&name));
    }

    /// Property: ordered queues always reject a missing group id
    #[test]
    fn fifo_send_requires_group(name in fifo_queue_name_strategy(), body in message_body_strategy()) {
        let err = build_send_request(&name, body, None, None).unwrap_err();
        prop_assert_eq!(err, ProducerError::missing_group_id(name));
    }

    /// Property: standard queue requests never carry ordering fields
    #[test]
    fn standard_send_has_no_ordering_fields(
        name in standard_queue_name_strategy(),
        body in message_body_strategy(),
        group in proptest::option::of("[a-z]{1,8}"),
    ) {
        let request = build_send_request(&name, body.clone(), group.as_deref(), None).unwrap();
        prop_assert!(request.group_id.is_none());
        prop_assert!(request.deduplication_id.is_none());
        prop_assert_eq!(request.body, body);
    }

    /// Property: batches are split into transport-sized chunks, preserving order
    /// and giving every entry a unique id
    #[test]
    fn batches_chunk_preserving_order(name in standard_queue_name_strategy(), bodies in message_batch_strategy()) {
        let requests = build_batch_requests(&name, &bodies, None).unwrap();

        let expected_chunks = bodies.len().div_ceil(TRANSPORT_BATCH_LIMIT as usize);
        prop_assert_eq!(requests.len(), expected_chunks);
        prop_assert!(requests.iter().all(|r| !r.entries.is_empty()
            && r.entries.len() <= TRANSPORT_BATCH_LIMIT as usize));

        let flattened: Vec<&str> = requests
            .iter()
            .flat_map(|r| r.entries.iter().map(|e| e.body.as_str()))
            .collect();
        let original: Vec<&str> = bodies.iter().map(String::as_str).collect();
        prop_assert_eq!(flattened, original);

        let ids: Vec<String> = requests
            .iter()
            .flat_map(|r| r.entries.iter().map(|e| e.id.clone()))
            .collect();
        let expected_ids: Vec<String> = (0..bodies.len()).map(|i| i.to_string()).collect();
        prop_assert_eq!(ids, expected_ids);
    }

    /// Property: the receive batch size never exceeds the transport limit
    #[test]
    fn binding_batch_size_is_capped(max_messages in 1u32..1000) {
        let binding = QueueBinding::new("orders").with_max_messages(max_messages);
        let effective = binding.effective_max_messages();
        prop_assert!(effective >= 1 && effective <= TRANSPORT_BATCH_LIMIT);
        prop_assert_eq!(effective, max_messages.min(TRANSPORT_BATCH_LIMIT));
    }
}
