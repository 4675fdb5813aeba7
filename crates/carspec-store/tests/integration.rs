mod integration {
    pub mod common;
    mod export_tests;
    mod merge_tests;
}
