mod fed_plan_builder;
mod statement_group;
