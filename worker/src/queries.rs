use sqlx::{PgConnection, postgres::PgQueryResult};
use shared::models::VoteRow;

pub const CREATE_VOTES_TABLE: &str = "CREATE TABLE IF NOT EXISTS votes (
    id VARCHAR(255) NOT NULL UNIQUE,
    vote VARCHAR(255) NOT NULL
)";

pub struct Queries;

impl Queries {
    pub async fn create_votes_table(conn: &mut PgConnection) -> Result<PgQueryResult, sqlx::Error> {
        sqlx::query(CREATE_VOTES_TABLE).execute(conn).await
    }

    pub async fn insert_vote(conn: &mut PgConnection, voter_id: &str, vote: &str) -> Result<PgQueryResult, sqlx::Error> {
        sqlx::query("INSERT INTO votes (id, vote) VALUES ($1, $2)")
            .bind(voter_id)
            .bind(vote)
            .execute(conn)
            .await
    }

    pub async fn update_vote(conn: &mut PgConnection, voter_id: &str, vote: &str) -> Result<PgQueryResult, sqlx::Error> {
        sqlx::query("UPDATE votes SET vote = $2 WHERE id = $1")
            .bind(voter_id)
            .bind(vote)
            .execute(conn)
            .await
    }

    /// Round trip that keeps idle connections from being reaped.
    pub async fn keep_alive(conn: &mut PgConnection) -> Result<PgQueryResult, sqlx::Error> {
        sqlx::query("SELECT 1").execute(conn).await
    }

    pub async fn fetch_votes(conn: &mut PgConnection) -> Result<Vec<VoteRow>, sqlx::Error> {
        sqlx::query_as::<_, VoteRow>("SELECT id, vote FROM votes ORDER BY id")
            .fetch_all(conn)
            .await
    }
}
