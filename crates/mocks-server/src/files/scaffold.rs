//! Example mocks folder created on first run.

use super::reader::ROUTES_FOLDER;
use std::path::Path;
use tracing::info;

const COLLECTIONS: &str = r#"[
  {
    "id": "base",
    "routes": ["get-users:success", "get-user:success", "delete-user:success"]
  },
  {
    "id": "users-error",
    "from": "base",
    "routes": ["get-users:error"]
  },
  {
    "id": "user-not-found",
    "from": "users-error",
    "routes": ["get-user:not-found"]
  }
]
"#;

const USERS_ROUTES: &str = r#"[
  {
    "id": "get-users",
    "url": "/api/users",
    "method": "GET",
    "variants": [
      {
        "id": "success",
        "type": "json",
        "options": {
          "status": 200,
          "body": [
            { "id": 1, "name": "John Doe" },
            { "id": 2, "name": "Jane Doe" }
          ]
        }
      },
      {
        "id": "error",
        "type": "json",
        "options": {
          "status": 400,
          "body": { "message": "Error" }
        }
      }
    ]
  },
  {
    "id": "get-user",
    "url": "/api/users/:id",
    "method": "GET",
    "variants": [
      {
        "id": "success",
        "type": "json",
        "options": {
          "status": 200,
          "body": { "id": 1, "name": "John Doe" }
        }
      },
      {
        "id": "not-found",
        "type": "json",
        "delay": 500,
        "options": {
          "status": 404,
          "body": { "message": "User not found" }
        }
      }
    ]
  }
]
"#;

const ADMIN_ROUTES: &str = r#"[
  {
    "id": "delete-user",
    "url": "/api/users/:id",
    "method": "DELETE",
    "variants": [
      {
        "id": "success",
        "type": "status",
        "options": {
          "status": 204,
          "headers": { "x-mocks-server-example": "deleted" }
        }
      },
      {
        "id": "disabled",
        "disabled": true
      }
    ]
  }
]
"#;

/// Create an example mocks folder at `root` when it does not exist yet.
/// Returns whether it was created.
pub fn scaffold(root: &Path) -> std::io::Result<bool> {
    if root.exists() {
        return Ok(false);
    }
    let routes = root.join(ROUTES_FOLDER);
    std::fs::create_dir_all(&routes)?;
    std::fs::write(root.join("collections.json"), COLLECTIONS)?;
    std::fs::write(routes.join("admin.json"), ADMIN_ROUTES)?;
    std::fs::write(routes.join("users.json"), USERS_ROUTES)?;
    info!(path = %root.display(), "Created example mocks folder");
    Ok(true)
}
