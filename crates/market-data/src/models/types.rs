use std::borrow::Cow;

/// Provider identifier - mostly static constants ("EM", "SINA", ...)
pub type ProviderId = Cow<'static, str>;

/// Provider-agnostic instrument code, e.g. "600519"
pub type Symbol = String;
