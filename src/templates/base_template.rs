/// Properties every page shares through `base.html`.
pub trait BaseTemplate {
    fn flash_messages(&self) -> &Vec<String>;
    fn has_flash_messages(&self) -> bool;
    fn version(&self) -> &str;
}

/// Implement BaseTemplate for a struct with the standard fields
#[macro_export]
macro_rules! impl_base_template {
    ($struct_name:ty) => {
        impl $crate::templates::BaseTemplate for $struct_name {
            fn flash_messages(&self) -> &Vec<String> {
                &self.flash_messages
            }
            fn has_flash_messages(&self) -> bool {
                self.has_flash_messages
            }
            fn version(&self) -> &str {
                self.version
            }
        }
    };
}

/// Standard fields, filled once per request.
#[derive(Clone, Debug, Default)]
pub struct PageGlobals {
    pub flash_messages: Vec<String>,
    pub has_flash_messages: bool,
    pub version: &'static str,
}

impl PageGlobals {
    pub fn new(flash: Option<String>) -> Self {
        let flash_messages: Vec<String> = flash.into_iter().filter(|m| !m.trim().is_empty()).collect();
        PageGlobals {
            has_flash_messages: !flash_messages.is_empty(),
            flash_messages,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
