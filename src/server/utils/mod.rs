pub mod encoding_utils;
pub mod header_profile;
pub mod rewrite_utils;
pub mod shim_utils;
pub mod slug_utils;
