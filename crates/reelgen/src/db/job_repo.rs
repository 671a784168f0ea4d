//! Row mapping and queries for the `video_jobs` table.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::job::{JobArtifacts, Stage, VideoInput, VideoJob, VisualSource};

/// A raw `video_jobs` row.
#[derive(Debug, Clone)]
pub struct VideoJobRow {
    pub id: String,
    pub owner_id: String,
    pub topic: String,
    pub description: String,
    pub narrator: String,
    pub visual_style: String,
    pub posting_methods: String,
    pub is_one_time: bool,
    pub video_theme: String,
    pub background_music: String,
    pub media_type: String,
    pub cleaned_topic: String,
    pub script: String,
    pub essence: String,
    pub stage: String,
    pub failed_step: Option<String>,
    pub visual_source: Option<String>,
    pub progress: u8,
    pub error: Option<String>,
    pub script_generated: bool,
    pub tts_generated: bool,
    pub srt_generated: bool,
    pub prompts_generated: bool,
    pub images_generated: bool,
    pub video_stitched: bool,
    pub video_uploaded: bool,
    pub tts_url: Option<String>,
    pub transcript_url: Option<String>,
    pub final_video_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl VideoJobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            topic: row.get("topic")?,
            description: row.get("description")?,
            narrator: row.get("narrator")?,
            visual_style: row.get("visual_style")?,
            posting_methods: row.get("posting_methods")?,
            is_one_time: row.get("is_one_time")?,
            video_theme: row.get("video_theme")?,
            background_music: row.get("background_music")?,
            media_type: row.get("media_type")?,
            cleaned_topic: row.get("cleaned_topic")?,
            script: row.get("script")?,
            essence: row.get("essence")?,
            stage: row.get("stage")?,
            failed_step: row.get("failed_step")?,
            visual_source: row.get("visual_source")?,
            progress: row.get("progress")?,
            error: row.get("error")?,
            script_generated: row.get("script_generated")?,
            tts_generated: row.get("tts_generated")?,
            srt_generated: row.get("srt_generated")?,
            prompts_generated: row.get("prompts_generated")?,
            images_generated: row.get("images_generated")?,
            video_stitched: row.get("video_stitched")?,
            video_uploaded: row.get("video_uploaded")?,
            tts_url: row.get("tts_url")?,
            transcript_url: row.get("transcript_url")?,
            final_video_url: row.get("final_video_url")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Flattens a job. The flag columns are written for readers of the table;
    /// loading recomputes them from the stage.
    pub fn from_job(job: &VideoJob) -> Self {
        let (stage, failed_step) = job.stage().to_columns();
        let flags = job.flags();
        let input = &job.input;
        Self {
            id: job.id.clone(),
            owner_id: job.owner_id.clone(),
            topic: input.topic.clone(),
            description: input.description.clone(),
            narrator: input.narrator.as_str().to_string(),
            visual_style: input.visual_style.as_str().to_string(),
            posting_methods: serde_json::to_string(&input.posting_methods)
                .unwrap_or_else(|_| "[]".to_string()),
            is_one_time: input.is_one_time,
            video_theme: input.video_theme.clone(),
            background_music: input.background_music.clone(),
            media_type: input.media_type.as_str().to_string(),
            cleaned_topic: job.cleaned_topic.clone(),
            script: job.script.clone(),
            essence: job.essence.clone(),
            stage: stage.to_string(),
            failed_step: failed_step.map(str::to_string),
            visual_source: job.visual_source().map(|v| v.as_str().to_string()),
            progress: job.progress(),
            error: job.error().map(str::to_string),
            script_generated: flags.script_generated,
            tts_generated: flags.tts_generated,
            srt_generated: flags.srt_generated,
            prompts_generated: flags.prompts_generated,
            images_generated: flags.images_generated,
            video_stitched: flags.video_stitched,
            video_uploaded: flags.video_uploaded,
            tts_url: job.artifacts.tts_url.clone(),
            transcript_url: job.artifacts.transcript_url.clone(),
            final_video_url: job.artifacts.final_video_url.clone(),
            created_at: format_timestamp(&job.created_at),
            updated_at: format_timestamp(&job.updated_at),
        }
    }

    pub fn into_job(self) -> Result<VideoJob, DatabaseError> {
        let id = self.id.clone();
        let corrupt = |reason: String| DatabaseError::Corrupt {
            id: id.clone(),
            reason,
        };

        let input = VideoInput {
            topic: self.topic,
            description: self.description,
            narrator: self.narrator.parse().map_err(|e| corrupt(format!("{}", e)))?,
            visual_style: self
                .visual_style
                .parse()
                .map_err(|e| corrupt(format!("{}", e)))?,
            posting_methods: serde_json::from_str(&self.posting_methods)
                .map_err(|e| corrupt(format!("posting_methods: {}", e)))?,
            is_one_time: self.is_one_time,
            video_theme: self.video_theme,
            background_music: self.background_music,
            media_type: self.media_type.parse().map_err(|e| corrupt(format!("{}", e)))?,
        };
        let stage = Stage::from_columns(&self.stage, self.failed_step.as_deref()).map_err(corrupt)?;
        let visuals = self
            .visual_source
            .as_deref()
            .map(str::parse::<VisualSource>)
            .transpose()
            .map_err(corrupt)?;

        Ok(VideoJob {
            id: self.id,
            owner_id: self.owner_id,
            input,
            cleaned_topic: self.cleaned_topic,
            script: self.script,
            essence: self.essence,
            stage,
            visuals,
            progress: self.progress,
            error: self.error,
            artifacts: JobArtifacts {
                tts_url: self.tts_url,
                transcript_url: self.transcript_url,
                final_video_url: self.final_video_url,
            },
            created_at: parse_timestamp(&self.created_at).map_err(&corrupt)?,
            updated_at: parse_timestamp(&self.updated_at).map_err(&corrupt)?,
        })
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("timestamp '{}': {}", raw, e))
}

/// Inserts the row, or overwrites everything but `created_at` if the id exists.
pub fn upsert(db: &Database, job: &VideoJobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO video_jobs (id, owner_id, topic, description, narrator, visual_style,
             posting_methods, is_one_time, video_theme, background_music, media_type,
             cleaned_topic, script, essence, stage, failed_step, visual_source, progress, error,
             script_generated, tts_generated, srt_generated, prompts_generated, images_generated,
             video_stitched, video_uploaded, tts_url, transcript_url, final_video_url,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31)
             ON CONFLICT(id) DO UPDATE SET
                owner_id=excluded.owner_id, topic=excluded.topic,
                description=excluded.description, narrator=excluded.narrator,
                visual_style=excluded.visual_style, posting_methods=excluded.posting_methods,
                is_one_time=excluded.is_one_time, video_theme=excluded.video_theme,
                background_music=excluded.background_music, media_type=excluded.media_type,
                cleaned_topic=excluded.cleaned_topic, script=excluded.script,
                essence=excluded.essence, stage=excluded.stage,
                failed_step=excluded.failed_step, visual_source=excluded.visual_source,
                progress=excluded.progress, error=excluded.error,
                script_generated=excluded.script_generated,
                tts_generated=excluded.tts_generated, srt_generated=excluded.srt_generated,
                prompts_generated=excluded.prompts_generated,
                images_generated=excluded.images_generated,
                video_stitched=excluded.video_stitched, video_uploaded=excluded.video_uploaded,
                tts_url=excluded.tts_url, transcript_url=excluded.transcript_url,
                final_video_url=excluded.final_video_url, updated_at=excluded.updated_at",
            params![
                job.id,
                job.owner_id,
                job.topic,
                job.description,
                job.narrator,
                job.visual_style,
                job.posting_methods,
                job.is_one_time,
                job.video_theme,
                job.background_music,
                job.media_type,
                job.cleaned_topic,
                job.script,
                job.essence,
                job.stage,
                job.failed_step,
                job.visual_source,
                job.progress,
                job.error,
                job.script_generated,
                job.tts_generated,
                job.srt_generated,
                job.prompts_generated,
                job.images_generated,
                job.video_stitched,
                job.video_uploaded,
                job.tts_url,
                job.transcript_url,
                job.final_video_url,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<VideoJobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM video_jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], VideoJobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// All jobs of one owner ordered by creation time.
pub fn list_by_owner(
    db: &Database,
    owner_id: &str,
    newest_first: bool,
) -> Result<Vec<VideoJobRow>, DatabaseError> {
    let sql = if newest_first {
        "SELECT * FROM video_jobs WHERE owner_id = ?1 ORDER BY created_at DESC, id"
    } else {
        "SELECT * FROM video_jobs WHERE owner_id = ?1 ORDER BY created_at ASC, id"
    };
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![owner_id], VideoJobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
