use super::*;

#[test]
fn test_root_params_pack_without_overlap() {
    let params = [
        RootParam::PerObject,
        RootParam::PerMesh,
        RootParam::View,
        RootParam::Settings,
        RootParam::MiscUint,
        RootParam::MiscFloat,
        RootParam::TransparencyInfo,
    ];
    let mut expected_offset = 0;
    for param in params {
        assert_eq!(param.byte_offset(), expected_offset, "{:?}", param);
        expected_offset += param.size_bytes();
    }
    assert_eq!(expected_offset, PUSH_CONSTANT_SIZE);
}
