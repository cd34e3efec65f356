//! Validating JSON extractor for wine samples
//!
//! Rejects the request before the handler runs when the body is not a
//! well-formed sample or any field is out of range. Every such rejection is
//! a 422 carrying one `detail` entry per problem:
//!
//! ```json
//! {"detail": [{"type": "less_than_equal", "loc": ["body", "alcohol"],
//!              "msg": "Input should be less than or equal to 10",
//!              "input": 20.0, "ctx": {"le": 10.0}}]}
//! ```

use axum::{
    async_trait,
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection},
        FromRequest, Request,
    },
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;
use winequality_core::{feature_names, FieldViolation, ValidatedSample, ViolationKind, WineSample};

const DATA_ERROR_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

/// A request body that parsed as a [`WineSample`] and passed validation.
///
/// A body without a `Content-Type` header is still read as JSON; only an
/// explicit non-JSON media type is refused.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson(pub ValidatedSample);

#[async_trait]
impl<S> FromRequest<S> for ValidatedJson
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !accepts_json(req.headers()) {
            return Err(ValidationRejection::unsupported_media_type());
        }

        let body = Bytes::from_request(req, state).await?;
        if body.is_empty() {
            return Err(ValidationRejection::single(ErrorDetail::new(
                "missing",
                &["body"],
                "Field required",
            )));
        }

        let Json(sample) = Json::<WineSample>::from_bytes(&body)?;

        sample
            .validate()
            .map(ValidatedJson)
            .map_err(ValidationRejection::from_violations)
    }
}

/// Absent or JSON-typed (`application/json`, `application/*+json`) content
fn accepts_json(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(CONTENT_TYPE) else {
        return true;
    };

    let essence = value
        .to_str()
        .unwrap_or_default()
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

/// One entry of a rejection's `detail` list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,

    pub loc: Vec<String>,

    pub msg: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctx: Option<Value>,
}

impl ErrorDetail {
    fn new(kind: &str, loc: &[&str], msg: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            loc: loc.iter().map(|s| s.to_string()).collect(),
            msg: msg.into(),
            input: None,
            ctx: None,
        }
    }
}

impl From<&FieldViolation> for ErrorDetail {
    fn from(violation: &FieldViolation) -> Self {
        let ctx = match violation.kind {
            ViolationKind::BelowMinimum { min } => Some(json!({ "ge": min })),
            ViolationKind::AboveMaximum { max } => Some(json!({ "le": max })),
            ViolationKind::NotFinite => None,
        };

        Self {
            input: Some(json!(violation.value)),
            ctx,
            ..Self::new(
                violation.kind.code(),
                &["body", violation.field],
                violation.kind.message(),
            )
        }
    }
}

/// Request rejected before reaching the prediction handler
#[derive(Debug)]
pub struct ValidationRejection {
    status: StatusCode,
    detail: Vec<ErrorDetail>,
}

impl ValidationRejection {
    fn from_violations(violations: Vec<FieldViolation>) -> Self {
        debug!(count = violations.len(), "Sample failed range validation");
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: violations.iter().map(ErrorDetail::from).collect(),
        }
    }

    fn single(detail: ErrorDetail) -> Self {
        debug!(kind = %detail.kind, "Rejected request body");
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: vec![detail],
        }
    }

    fn unsupported_media_type() -> Self {
        Self {
            status: StatusCode::UNSUPPORTED_MEDIA_TYPE,
            detail: vec![ErrorDetail::new(
                "content_type",
                &["header", "content-type"],
                "Expected request with `Content-Type: application/json`",
            )],
        }
    }

    /// HTTP status of the rejection
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Per-problem details
    pub fn detail(&self) -> &[ErrorDetail] {
        &self.detail
    }
}

impl From<JsonRejection> for ValidationRejection {
    fn from(rejection: JsonRejection) -> Self {
        let text = rejection.body_text();
        let detail = match &rejection {
            JsonRejection::JsonDataError(_) => data_error_detail(&text),
            _ => ErrorDetail::new("json_invalid", &["body"], "JSON decode error"),
        };
        debug!(reason = %text, "Request body is not a wine sample");

        Self::single(detail)
    }
}

/// Failure to read the body at all, such as exceeding the size limit
impl From<BytesRejection> for ValidationRejection {
    fn from(rejection: BytesRejection) -> Self {
        debug!(status = %rejection.status(), "Failed to read request body");
        Self {
            status: rejection.status(),
            detail: vec![ErrorDetail::new("body", &["body"], rejection.body_text())],
        }
    }
}

impl IntoResponse for ValidationRejection {
    fn into_response(self) -> Response {
        metrics::counter!("winequality_errors_total", "kind" => "validation").increment(1);
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

/// Describe a deserialization failure, pointing at the field when known
fn data_error_detail(text: &str) -> ErrorDetail {
    let reason = text.strip_prefix(DATA_ERROR_PREFIX).unwrap_or(text);

    if let Some(field) = reason
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next())
    {
        return ErrorDetail::new("missing", &["body", field], "Field required");
    }

    if let Some((path, cause)) = reason.split_once(": ") {
        if feature_names().any(|name| name == path) {
            return ErrorDetail::new("float_type", &["body", path], cause);
        }
    }

    ErrorDetail::new("value_error", &["body"], reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn valid_body() -> Value {
        json!({
            "fixed_acidity": 7.4,
            "volatile_acidity": 0.5,
            "citric_acid": 0.05,
            "residual_sugar": 1.9,
            "chlorides": 0.09,
            "free_sulfur_dioxide": 11,
            "total_sulfur_dioxide": 25,
            "density": 0.997,
            "pH": 3.3,
            "sulphates": 0.6,
            "alcohol": 9.5
        })
    }

    fn json_request(body: String) -> Request {
        Request::builder()
            .method("POST")
            .uri("/predict-quality")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn extract(req: Request) -> Result<ValidatedJson, ValidationRejection> {
        ValidatedJson::from_request(req, &()).await
    }

    #[tokio::test]
    async fn test_accepts_valid_sample() {
        let ValidatedJson(sample) = extract(json_request(valid_body().to_string()))
            .await
            .unwrap();
        assert_eq!(sample.sample().alcohol, 9.5);
    }

    #[tokio::test]
    async fn test_out_of_range_field() {
        let mut body = valid_body();
        body["alcohol"] = json!(20);

        let rejection = extract(json_request(body.to_string())).await.unwrap_err();
        assert_eq!(rejection.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            rejection.detail(),
            &[ErrorDetail {
                kind: "less_than_equal".to_string(),
                loc: vec!["body".to_string(), "alcohol".to_string()],
                msg: "Input should be less than or equal to 10".to_string(),
                input: Some(json!(20.0)),
                ctx: Some(json!({"le": 10.0})),
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_field() {
        let mut body = valid_body();
        body.as_object_mut().unwrap().remove("pH");

        let rejection = extract(json_request(body.to_string())).await.unwrap_err();
        assert_eq!(rejection.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(rejection.detail()[0].kind, "missing");
        assert_eq!(rejection.detail()[0].loc, vec!["body", "pH"]);
    }

    #[tokio::test]
    async fn test_non_numeric_field() {
        let mut body = valid_body();
        body["density"] = json!("heavy");

        let rejection = extract(json_request(body.to_string())).await.unwrap_err();
        assert_eq!(rejection.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(rejection.detail()[0].loc[0], "body");
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let rejection = extract(json_request("{\"alcohol\": ".to_string()))
            .await
            .unwrap_err();
        assert_eq!(rejection.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(rejection.detail()[0].kind, "json_invalid");
        assert_eq!(rejection.detail()[0].loc, vec!["body"]);
    }

    #[tokio::test]
    async fn test_empty_body_is_missing() {
        let rejection = extract(json_request(String::new())).await.unwrap_err();

        assert_eq!(rejection.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            rejection.detail(),
            &[ErrorDetail::new("missing", &["body"], "Field required")]
        );
    }

    #[tokio::test]
    async fn test_missing_content_type_is_read_as_json() {
        let req = Request::builder()
            .method("POST")
            .uri("/predict-quality")
            .body(Body::from(valid_body().to_string()))
            .unwrap();

        let ValidatedJson(sample) = extract(req).await.unwrap();
        assert_eq!(sample.sample().ph, 3.3);
    }

    #[tokio::test]
    async fn test_non_json_content_type() {
        let req = Request::builder()
            .method("POST")
            .uri("/predict-quality")
            .header(CONTENT_TYPE, "text/plain")
            .body(Body::from(valid_body().to_string()))
            .unwrap();

        let rejection = extract(req).await.unwrap_err();
        assert_eq!(rejection.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn test_json_media_types() {
        let accepts = |value: &str| {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, value.parse().unwrap());
            accepts_json(&headers)
        };

        assert!(accepts_json(&HeaderMap::new()));
        assert!(accepts("application/json"));
        assert!(accepts("Application/JSON; charset=utf-8"));
        assert!(accepts("application/vnd.api+json"));
        assert!(!accepts("text/plain"));
        assert!(!accepts("application/x-www-form-urlencoded"));
    }

    #[test]
    fn test_data_error_points_at_field() {
        let detail = data_error_detail(
            "Failed to deserialize the JSON body into the target type: density: invalid type: string \"heavy\", expected f64 at line 1 column 20",
        );
        assert_eq!(detail.loc, vec!["body", "density"]);
        assert_eq!(detail.kind, "float_type");
    }
}
