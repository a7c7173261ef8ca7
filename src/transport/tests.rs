use crate::transport::http::{HttpTransport, RetryPolicy};

#[test]
fn test_transport_exports_compile() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_attempts, 1);
    let transport = HttpTransport::new(Some(1_000), policy);
    assert!(transport.is_ok());
}
