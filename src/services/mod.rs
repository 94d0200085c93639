pub mod ad_copy;
pub mod platform_gateway;

pub use ad_copy::{
    build_prompt, extract_json, normalize_copy, AdCopyService, CopyGenerator, OpenAiCopyGenerator,
};
pub use platform_gateway::{NewAdBatch, PlatformGateway};
