//! End-to-end analysis over a fixture codebase and a throwaway SQLite
//! database.
//!
//! The fixture mirrors a small blog: `User` has many `Post`s and one
//! `Profile`, `Post` belongs to `User` and has many `Comment`s, `Comment`
//! belongs to `Post` and is the polymorphic owner side of `User`'s
//! `morphMany`. `Profile::user()` is deliberately declared `hasOne`
//! instead of `belongsTo`, creating the `User → Profile → User` cycle.

use std::fs;
use std::path::Path;

use relscope::prelude::*;

const USER: &str = r#"<?php

namespace App\Models;

use Illuminate\Database\Eloquent\Model;

class User extends Model
{
    protected $table = 'users';

    /** Has correct inverse in Post */
    public function posts()
    {
        return $this->hasMany(Post::class);
    }

    /** Creates a circular dependency: User hasOne Profile, Profile hasOne User */
    public function profile()
    {
        return $this->hasOne(Profile::class);
    }

    public function comments()
    {
        return $this->morphMany(Comment::class, 'commentable');
    }
}
"#;

const POST: &str = r#"<?php

namespace App\Models;

use Illuminate\Database\Eloquent\Model;

class Post extends Model
{
    protected $table = 'posts';

    public function user()
    {
        return $this->belongsTo(User::class);
    }

    public function comments()
    {
        return $this->hasMany(Comment::class);
    }
}
"#;

const PROFILE: &str = r#"<?php

namespace App\Models;

use Illuminate\Database\Eloquent\Model;

class Profile extends Model
{
    protected $table = 'profiles';

    /** Should be belongsTo(User::class); intentionally wrong */
    public function user()
    {
        return $this->hasOne(User::class);
    }
}
"#;

const COMMENT: &str = r#"<?php

namespace App\Models;

use Illuminate\Database\Eloquent\Model;

class Comment extends Model
{
    protected $table = 'comments';

    public function post()
    {
        return $this->belongsTo(Post::class);
    }

    public function commentable()
    {
        return $this->morphTo();
    }
}
"#;

fn write_models(root: &Path) {
    let models = root.join("app/Models");
    fs::create_dir_all(&models).unwrap();
    fs::write(models.join("User.php"), USER).unwrap();
    fs::write(models.join("Post.php"), POST).unwrap();
    fs::write(models.join("Profile.php"), PROFILE).unwrap();
    fs::write(models.join("Comment.php"), COMMENT).unwrap();
}

fn write_migrations(root: &Path) {
    let dir = root.join("database/migrations");
    fs::create_dir_all(&dir).unwrap();

    let files = [
        (
            "2020_01_01_000001_create_users_table.php",
            "Schema::create('users', function (Blueprint $table) {
                $table->id();
                $table->string('name');
                $table->string('email');
                $table->timestamps();
            });",
        ),
        (
            "2020_01_01_000002_create_posts_table.php",
            "Schema::create('posts', function (Blueprint $table) {
                $table->id();
                $table->foreignId('user_id');
                $table->string('title');
                $table->timestamps();
            });",
        ),
        (
            "2020_01_01_000003_create_profiles_table.php",
            "Schema::create('profiles', function (Blueprint $table) {
                $table->id();
                $table->foreignId('user_id');
                $table->text('bio');
            });",
        ),
        (
            "2020_01_01_000004_create_comments_table.php",
            "Schema::create('comments', function (Blueprint $table) {
                $table->id();
                $table->foreignId('post_id');
                $table->morphs('commentable');
                $table->text('body');
                $table->timestamps();
            });",
        ),
    ];

    for (name, body) in files {
        let source = format!(
            "<?php\n\nreturn new class extends Migration {{\n    public function up()\n    {{\n        {body}\n    }}\n\n    public function down() {{ }}\n}};\n"
        );
        fs::write(dir.join(name), source).unwrap();
    }
}

async fn seed_database(path: &Path) {
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let pool = sqlx::sqlite::SqlitePool::connect(&url).await.unwrap();

    for statement in [
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT, email TEXT, created_at TEXT, updated_at TEXT
        )",
        "CREATE TABLE posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER REFERENCES users(id),
            title TEXT, created_at TEXT, updated_at TEXT
        )",
        "CREATE INDEX posts_user_id_index ON posts(user_id)",
        "CREATE TABLE profiles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER REFERENCES users(id),
            bio TEXT
        )",
        "CREATE INDEX profiles_user_id_index ON profiles(user_id)",
        "CREATE TABLE comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER REFERENCES posts(id),
            commentable_id INTEGER, commentable_type TEXT,
            body TEXT, created_at TEXT, updated_at TEXT
        )",
        "CREATE INDEX comments_post_id_index ON comments(post_id)",
        "CREATE INDEX comments_commentable_index ON comments(commentable_id, commentable_type)",
    ] {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool.close().await;
}

async fn analyzer_for(root: &Path) -> ModelAnalyzer {
    write_models(root);
    write_migrations(root);
    let db = root.join("app.sqlite");
    seed_database(&db).await;

    let config = AnalyzerConfig {
        model_paths: vec![root.join("app/Models")],
        migration_paths: vec![root.join("database/migrations")],
        database_url: Some(format!("sqlite://{}", db.display())),
        ..AnalyzerConfig::default()
    };
    ModelAnalyzer::connect(config).await.unwrap()
}

fn issues_of<'a>(result: &'a AnalysisResult, kind: IssueKind) -> Vec<&'a Issue> {
    result.issues.iter().filter(|i| i.kind == kind).collect()
}

#[tokio::test]
async fn test_finds_all_fixture_models() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_for(dir.path()).await;
    let result = analyzer.analyze().await;

    let mut classes: Vec<&str> = result.models.iter().map(|m| m.class.as_str()).collect();
    classes.sort();
    assert_eq!(
        classes,
        vec![
            "App\\Models\\Comment",
            "App\\Models\\Post",
            "App\\Models\\Profile",
            "App\\Models\\User",
        ]
    );
    assert_eq!(result.total_relationships(), 8);
}

#[tokio::test]
async fn test_detects_the_profile_cycle_and_only_that_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_for(dir.path()).await;
    let result = analyzer.analyze().await;

    let cycles = issues_of(&result, IssueKind::CircularDependency);
    assert_eq!(cycles.len(), 1);

    let cycle: Vec<&str> = cycles[0].context["cycle"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert!(cycle.contains(&"App\\Models\\User"));
    assert!(cycle.contains(&"App\\Models\\Profile"));
    assert_eq!(cycle.len(), 2);
    assert!(cycles[0].message.contains("→"));
}

#[tokio::test]
async fn test_correct_pairs_are_not_flagged_as_missing_inverse() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_for(dir.path()).await;
    let result = analyzer.analyze().await;

    let missing = issues_of(&result, IssueKind::MissingInverse);

    // User::posts ↔ Post::user, Post::comments ↔ Comment::post, and
    // User::comments ↔ Comment::commentable are all correctly paired.
    for issue in &missing {
        let pair = (
            issue.context["model"].as_str().unwrap(),
            issue.context["related_model"].as_str().unwrap(),
        );
        assert!(
            pair != ("App\\Models\\User", "App\\Models\\Post")
                && pair != ("App\\Models\\Post", "App\\Models\\User")
                && pair != ("App\\Models\\Post", "App\\Models\\Comment")
                && pair != ("App\\Models\\Comment", "App\\Models\\Post")
                && pair != ("App\\Models\\User", "App\\Models\\Comment"),
            "unexpected missing_inverse for {pair:?}"
        );
    }

    // The two halves of the broken User/Profile pair are flagged.
    assert_eq!(missing.len(), 2);
}

#[tokio::test]
async fn test_health_score_is_penalized_but_positive() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_for(dir.path()).await;
    let result = analyzer.analyze().await;

    assert!(result.health_score < 100);
    assert!(result.health_score > 0);
}

#[tokio::test]
async fn test_profiles_user_id_is_an_orphaned_foreign_key() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_for(dir.path()).await;
    let result = analyzer.analyze().await;

    // Profile declares no belongsTo, so its live user_id constraint is
    // orphaned.
    let orphaned = issues_of(&result, IssueKind::OrphanedForeignKey);
    assert!(orphaned.iter().any(|i| {
        i.context["table"] == "profiles" && i.context["column"] == "user_id"
    }));
}

#[tokio::test]
async fn test_consistent_migrations_produce_no_drift_issues() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_for(dir.path()).await;
    let result = analyzer.analyze().await;

    assert!(issues_of(&result, IssueKind::PendingMigration).is_empty());
    assert!(issues_of(&result, IssueKind::ColumnNotInDb).is_empty());
    assert!(issues_of(&result, IssueKind::NoMigrationForTable).is_empty());
    assert!(issues_of(&result, IssueKind::DbColumnNotInMigration).is_empty());
}

#[tokio::test]
async fn test_missing_migration_surfaces_as_pending() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_for(dir.path()).await;

    // Add a migration for a table the database does not have.
    let migrations = dir.path().join("database/migrations");
    fs::write(
        migrations.join("2024_01_01_000001_create_tags_table.php"),
        "<?php\nSchema::create('tags', function (Blueprint $table) {\n    $table->id();\n    $table->string('name');\n});\n",
    )
    .unwrap();

    let result = analyzer.analyze().await;
    let pending = issues_of(&result, IssueKind::PendingMigration);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].context["table"], "tags");
}

#[tokio::test]
async fn test_report_json_shape() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_for(dir.path()).await;
    let result = analyzer.analyze().await;

    let value = result.to_json();
    assert_eq!(value["health"]["stats"]["models"], 4);
    assert_eq!(value["health"]["stats"]["tables"], 4);
    assert_eq!(value["health"]["stats"]["relationships"], 8);
    assert!(value["health"]["score"].is_u64());
    assert!(value["issues"].is_array());

    let first = &value["issues"][0];
    assert!(first["type"].is_string());
    assert!(first["severity"].is_string());
    assert!(first["model"].is_string());
    assert!(first["message"].is_string());
}

#[tokio::test]
async fn test_progress_events_are_emitted_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_for(dir.path()).await;

    let mut events = Vec::new();
    analyzer
        .analyze_with(None, &mut |event| events.push(event))
        .await;

    let phases: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Phase { name } => Some(*name),
            _ => None,
        })
        .collect();
    assert_eq!(phases, vec!["scan", "schema", "migrations", "detect", "score"]);

    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEvent::RunStart { models: 4 }
    )));
    let done = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::ModelDone { .. }))
        .count();
    assert_eq!(done, 4);
}

#[tokio::test]
async fn test_model_filter_narrows_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_for(dir.path()).await;

    let only = vec!["User".to_string()];
    let result = analyzer.analyze_with(Some(&only), &mut |_| {}).await;

    assert_eq!(result.models.len(), 1);
    assert_eq!(result.models[0].short_name, "User");
}
