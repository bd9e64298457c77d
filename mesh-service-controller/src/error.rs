use mesh_controller_k8s_utils::{is_already_exists, is_conflict, is_not_found};
use mesh_controller_runtime::MetricLabel;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("kube error: {0}")]
    KubeError(kube::Error),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    #[error("resource {0} has no namespace")]
    MissingNamespace(String),

    #[error("utils error: {0}")]
    UtilsError(#[from] mesh_controller_k8s_utils::Error),

    #[error("other error: {0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        if is_not_found(&err) {
            return Error::NotFound(err.to_string());
        }
        if is_already_exists(&err) {
            return Error::AlreadyExists(err.to_string());
        }
        Error::KubeError(err)
    }
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists(_))
    }
}

impl MetricLabel for Error {
    fn metric_label(&self) -> String {
        match self {
            Error::KubeError(e) if is_conflict(e) => "conflict",
            Error::KubeError(_) => "kube",
            Error::NotFound(_) => "not_found",
            Error::AlreadyExists(_) => "already_exists",
            Error::MissingNamespace(_) => "missing_namespace",
            Error::UtilsError(_) => "utils",
            Error::Other(_) => "other",
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use kube::core::ErrorResponse;

    use super::*;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: format!("{reason} for test"),
            reason: reason.into(),
            code,
        })
    }

    #[test]
    fn test_kube_errors_are_classified() {
        assert!(Error::from(api_error(404, "NotFound")).is_not_found());
        assert!(Error::from(api_error(409, "AlreadyExists")).is_already_exists());

        let conflict = Error::from(api_error(409, "Conflict"));
        assert!(!conflict.is_already_exists());
        assert_eq!(conflict.metric_label(), "conflict");
    }
}
