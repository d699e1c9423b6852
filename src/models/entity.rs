use chrono::NaiveDateTime;

/// One row of a tenant's `entities` table.
///
/// `id` is local to its tenant; two tenants will both have an entity 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRow {
    pub id: i32,
    pub last_updated: NaiveDateTime,
}

impl EntityRow {
    /// Appends the row in `COPY ... FROM STDIN` text format.
    pub fn write_copy_text(&self, buf: &mut Vec<u8>) {
        let line = format!(
            "{}\t{}\n",
            self.id,
            self.last_updated.format("%Y-%m-%d %H:%M:%S%.6f")
        );
        buf.extend_from_slice(line.as_bytes());
    }
}
