use super::*;

#[test]
fn test_display_formats_carry_context() {
    let err = Error::DuplicateResource("HDRTarget".to_string());
    assert_eq!(format!("{}", err), "Duplicate resource: HDRTarget");

    let err = Error::OutOfMemory;
    assert_eq!(format!("{}", err), "Out of GPU memory");
}

#[test]
fn test_engine_err_builds_typed_variant() {
    let name = "DepthBuffer";
    let err = crate::engine_err!(MissingResource, "nebula3d::Tests",
        "resource not found: {}", name);
    assert_eq!(err, Error::MissingResource("resource not found: DepthBuffer".to_string()));
}

#[test]
fn test_engine_bail_returns_early() {
    fn fails() -> Result<u32> {
        crate::engine_bail!(UsageConflict, "nebula3d::Tests", "conflict on {}", "GBuffer");
    }
    match fails() {
        Err(Error::UsageConflict(msg)) => assert!(msg.contains("GBuffer")),
        other => panic!("expected UsageConflict, got {:?}", other),
    }
}
