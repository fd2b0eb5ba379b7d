use crate::error::AppError;
use axum::{extract::Request, middleware::Next, response::Response};
use tower_sessions::Session;

/// Session key under which the external auth system stores the signed-in student
pub const STUDENT_ID_KEY: &str = "student_id";

/// The student a guarded request acts for
#[derive(Debug, Clone)]
pub struct CurrentStudent(pub String);

/// Reject requests without a student session, and hand the id to handlers
pub async fn require_student(
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let student_id: Option<String> = session
        .get(STUDENT_ID_KEY)
        .await
        .map_err(|e| AppError::Internal(format!("Session error: {}", e)))?;

    match student_id {
        Some(id) => {
            request.extensions_mut().insert(CurrentStudent(id));
            Ok(next.run(request).await)
        }
        None => Err(AppError::Unauthorized("Not authenticated".to_string())),
    }
}
