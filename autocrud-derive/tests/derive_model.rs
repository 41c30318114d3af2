use autocrud::{
    BasicModel, Cardinality, FieldKind, FieldRole, Fields, Identify, Model, ModelSchema,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, autocrud::Model)]
pub struct Todo {
    #[serde(flatten)]
    pub base: BasicModel,
    pub title: String,
    pub detail: Option<String>,
    pub done: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, autocrud::Model)]
pub struct Project {
    #[serde(flatten)]
    pub base: BasicModel,
    pub title: String,
    #[serde(default)]
    #[model(many)]
    pub todos: Vec<Todo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, autocrud::Model)]
#[serde(rename_all = "camelCase")]
#[model(table = "people", name = "Person")]
pub struct Member {
    #[model(identity)]
    pub member_id: uuid::Uuid,
    pub display_name: String,
    #[serde(rename = "mail")]
    #[model(column = "email_address")]
    pub email: String,
    #[model(created_at)]
    pub joined_at: DateTime<Utc>,
    #[serde(skip)]
    pub session: Option<String>,
    #[serde(default)]
    #[model(one(join_table = "member_teams", child_key = "team_id"))]
    pub team: Option<Box<Team>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, autocrud::Model)]
pub struct Team {
    pub id: i32,
    pub label: String,
}

#[test]
fn test_table_and_type_name_defaults() {
    assert_eq!(Todo::TYPE_NAME, "Todo");
    assert_eq!(Todo::TABLE, "todos");
    assert_eq!(Member::TYPE_NAME, "Person");
    assert_eq!(Member::TABLE, "people");
    assert_eq!(Team::TABLE, "teams");
}

#[test]
fn test_embedded_model_contributes_fields_and_identity() {
    let names: Vec<_> = Todo::fields().iter().map(|f| f.name).collect();
    assert_eq!(
        names,
        ["ID", "CreatedAt", "UpdatedAt", "DeletedAt", "title", "detail", "done"]
    );

    let mut todo = Todo::default();
    todo.base.id = 7;
    assert_eq!(todo.identity(), ("ID", 7));

    let schema = ModelSchema::of::<Todo>();
    assert_eq!(schema.identity_field().column, "id");
    assert!(schema.field("detail").is_some_and(|f| f.nullable));
    assert!(schema.soft_delete().is_some());
}

#[test]
fn test_many_relation_defaults() {
    let schema = ModelSchema::of::<Project>();
    let todos = schema.field("todos").expect("todos field");
    let relation = todos.relation().expect("todos is a relation");
    assert_eq!(relation.join_table, "project_todos");
    assert_eq!(relation.parent_key, "project_id");
    assert_eq!(relation.child_key, "todo_id");
    assert_eq!(relation.cardinality, Cardinality::Many);
    assert_eq!(relation.target_schema().type_name, "Todo");
    assert!(!todos.is_scalar());
}

#[test]
fn test_serde_names_and_overrides() {
    let fields = Member::fields();
    let names: Vec<_> = fields.iter().map(|f| f.name).collect();
    assert_eq!(names, ["memberId", "displayName", "mail", "joinedAt", "team"]);

    let email = fields.iter().find(|f| f.name == "mail").expect("mail");
    assert_eq!(email.column, "email_address");
    assert!(matches!(email.kind, FieldKind::Text));

    let joined = fields.iter().find(|f| f.name == "joinedAt").expect("joinedAt");
    assert!(matches!(joined.kind, FieldKind::Timestamp));
    assert_eq!(joined.role, Some(FieldRole::CreatedAt));

    let member = Member::default();
    assert_eq!(member.identity().0, "memberId");
}

#[test]
fn test_one_relation_keys() {
    let schema = ModelSchema::of::<Member>();
    let relation = schema.field("team").and_then(|f| f.relation()).expect("team");
    assert_eq!(relation.join_table, "member_teams");
    assert_eq!(relation.parent_key, "member_id");
    assert_eq!(relation.child_key, "team_id");
    assert_eq!(relation.cardinality, Cardinality::One);
}

#[test]
fn test_plain_id_field_is_identity() {
    let team = Team {
        id: 3,
        label: "core".to_string(),
    };
    assert_eq!(team.identity(), ("id", 3));
    assert_eq!(ModelSchema::of::<Team>().id_param(), "Teamid");
}
