pub(super) const SELECT_DOCUMENT: &str = r#"
    SELECT seq, id, data, created_at, updated_at
    FROM documents
    WHERE collection = ? AND id = ?
"#;

pub(super) const INSERT_DOCUMENT: &str = r#"
    INSERT INTO documents (collection, id, data, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?)
"#;

pub(super) const UPDATE_DOCUMENT: &str = r#"
    UPDATE documents
    SET data = ?, updated_at = ?
    WHERE collection = ? AND id = ?
"#;

pub(super) const DELETE_DOCUMENT: &str = r#"
    DELETE FROM documents
    WHERE collection = ? AND id = ?
"#;

/// フィルタ・カーソル・順序は `list_documents` で動的に付け足す
pub(super) const SELECT_DOCUMENTS_BASE: &str = r#"
    SELECT seq, id, data, created_at, updated_at
    FROM documents
    WHERE collection = ?
"#;
