use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IpcError {
    #[error("share name `{name}` is forbidden: names may not start with `_`")]
    NameForbidden { name: String },

    #[error("share `{name}` is static and cannot bind a setter")]
    StaticNoSetter { name: String },

    #[error("share `{name}` already has a {kind} bound")]
    AlreadyBound { name: String, kind: &'static str },

    #[error("share `{name}` has no {kind} bound")]
    Unbound { name: String, kind: &'static str },

    #[error("plugin `{owner}` already has a share named `{name}`")]
    AlreadyRegistered { owner: String, name: String },

    #[error("plugin `{owner}` provides no shares")]
    UnknownOwner { owner: String },

    #[error("plugin `{owner}` has no share named `{name}`")]
    UnknownShare { owner: String, name: String },
}
