//! Recursive-descent parser producing an [`ast::Statement`].

use crate::ast::*;
use crate::lexer::Token;
use crate::schema::DataType;
use crate::value::Value;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0 }
    }

    fn current_token(&self) -> &Token {
        self.tokens.get(self.current).unwrap_or(&Token::Eof)
    }

    fn consume(&mut self, expected: Token) -> Result<(), String> {
        if *self.current_token() == expected {
            self.current += 1;
            Ok(())
        } else {
            Err(format!(
                "expected {:?}, found {:?}",
                expected,
                self.current_token()
            ))
        }
    }

    fn advance(&mut self) -> Token {
        let token = self.current_token().clone();
        self.current += 1;
        token
    }

    fn expect_identifier(&mut self) -> Result<String, String> {
        match self.advance() {
            Token::Identifier(name) => Ok(name),
            other => Err(format!("expected an identifier, found {other:?}")),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, String> {
        match self.current_token() {
            Token::Select => self.parse_select(),
            Token::Insert => self.parse_insert(),
            Token::Update => self.parse_update(),
            Token::Delete => self.parse_delete(),
            Token::Create => self.parse_create_table(),
            Token::Drop => self.parse_drop_table(),
            other => Err(format!("unexpected token: {other:?}")),
        }
    }

    fn parse_select(&mut self) -> Result<Statement, String> {
        self.consume(Token::Select)?;
        let columns = self.parse_select_columns()?;
        self.consume(Token::From)?;
        let from = self.expect_identifier()?;

        let where_clause = self.parse_optional_where()?;

        let order_by = if *self.current_token() == Token::Order {
            self.advance();
            self.consume(Token::By)?;
            Some(self.parse_order_by()?)
        } else {
            None
        };

        let limit = if *self.current_token() == Token::Limit {
            self.advance();
            Some(self.parse_usize()?)
        } else {
            None
        };

        let offset = if *self.current_token() == Token::Offset {
            self.advance();
            Some(self.parse_usize()?)
        } else {
            None
        };

        self.skip_trailing_semicolon();
        Ok(Statement::Select(SelectStatement {
            columns,
            from,
            where_clause,
            order_by,
            limit,
            offset,
        }))
    }

    fn parse_select_columns(&mut self) -> Result<Vec<Column>, String> {
        if *self.current_token() == Token::Star {
            self.advance();
            return Ok(vec![Column::All]);
        }
        let mut columns = vec![Column::Named(self.expect_identifier()?)];
        while *self.current_token() == Token::Comma {
            self.advance();
            columns.push(Column::Named(self.expect_identifier()?));
        }
        Ok(columns)
    }

    fn parse_order_by(&mut self) -> Result<Vec<OrderByExpr>, String> {
        let mut items = vec![self.parse_order_by_item()?];
        while *self.current_token() == Token::Comma {
            self.advance();
            items.push(self.parse_order_by_item()?);
        }
        Ok(items)
    }

    fn parse_order_by_item(&mut self) -> Result<OrderByExpr, String> {
        let column = self.expect_identifier()?;
        let asc = match self.current_token() {
            Token::Asc => {
                self.advance();
                true
            }
            Token::Desc => {
                self.advance();
                false
            }
            _ => true,
        };
        Ok(OrderByExpr { column, asc })
    }

    fn parse_usize(&mut self) -> Result<usize, String> {
        match self.advance() {
            Token::Number(n) if n >= 0 => Ok(n as usize),
            other => Err(format!("expected a non-negative integer, found {other:?}")),
        }
    }

    fn parse_optional_where(&mut self) -> Result<Option<Expression>, String> {
        if *self.current_token() == Token::Where {
            self.advance();
            Ok(Some(self.parse_expression()?))
        } else {
            Ok(None)
        }
    }

    fn parse_insert(&mut self) -> Result<Statement, String> {
        self.consume(Token::Insert)?;
        self.consume(Token::Into)?;
        let table = self.expect_identifier()?;

        let columns = if *self.current_token() == Token::LeftParen {
            self.advance();
            let mut names = vec![self.expect_identifier()?];
            while *self.current_token() == Token::Comma {
                self.advance();
                names.push(self.expect_identifier()?);
            }
            self.consume(Token::RightParen)?;
            Some(names)
        } else {
            None
        };

        self.consume(Token::Values)?;
        let mut values = vec![self.parse_value_tuple()?];
        while *self.current_token() == Token::Comma {
            self.advance();
            values.push(self.parse_value_tuple()?);
        }

        self.skip_trailing_semicolon();
        Ok(Statement::Insert(InsertStatement {
            table,
            columns,
            values,
        }))
    }

    fn parse_value_tuple(&mut self) -> Result<Vec<Value>, String> {
        self.consume(Token::LeftParen)?;
        let mut values = vec![self.parse_literal()?];
        while *self.current_token() == Token::Comma {
            self.advance();
            values.push(self.parse_literal()?);
        }
        self.consume(Token::RightParen)?;
        Ok(values)
    }

    fn parse_literal(&mut self) -> Result<Value, String> {
        match self.advance() {
            Token::Number(n) => Ok(Value::Int(n)),
            Token::Float(f) => Ok(Value::Float(f)),
            Token::StringLiteral(s) => Ok(Value::Text(s)),
            Token::Null => Ok(Value::Null),
            other => Err(format!("expected a literal value, found {other:?}")),
        }
    }

    fn parse_update(&mut self) -> Result<Statement, String> {
        self.consume(Token::Update)?;
        let table = self.expect_identifier()?;
        self.consume(Token::Set)?;

        let mut assignments = vec![self.parse_assignment()?];
        while *self.current_token() == Token::Comma {
            self.advance();
            assignments.push(self.parse_assignment()?);
        }

        let where_clause = self.parse_optional_where()?;
        self.skip_trailing_semicolon();
        Ok(Statement::Update(UpdateStatement {
            table,
            assignments,
            where_clause,
        }))
    }

    fn parse_assignment(&mut self) -> Result<Assignment, String> {
        let column = self.expect_identifier()?;
        self.consume(Token::Equal)?;
        let value = self.parse_literal()?;
        Ok(Assignment { column, value })
    }

    fn parse_delete(&mut self) -> Result<Statement, String> {
        self.consume(Token::Delete)?;
        self.consume(Token::From)?;
        let table = self.expect_identifier()?;
        let where_clause = self.parse_optional_where()?;
        self.skip_trailing_semicolon();
        Ok(Statement::Delete(DeleteStatement { table, where_clause }))
    }

    fn parse_create_table(&mut self) -> Result<Statement, String> {
        self.consume(Token::Create)?;
        self.consume(Token::Table)?;
        let name = self.expect_identifier()?;
        self.consume(Token::LeftParen)?;

        let mut columns = vec![self.parse_column_definition()?];
        while *self.current_token() == Token::Comma {
            self.advance();
            columns.push(self.parse_column_definition()?);
        }
        self.consume(Token::RightParen)?;
        self.skip_trailing_semicolon();
        Ok(Statement::CreateTable(CreateTableStatement { name, columns }))
    }

    fn parse_column_definition(&mut self) -> Result<ColumnDefinition, String> {
        let name = self.expect_identifier()?;
        let data_type = match self.advance() {
            Token::Int => DataType::Int,
            Token::Text => DataType::Text,
            other => return Err(format!("unsupported column type: {other:?}")),
        };
        Ok(ColumnDefinition { name, data_type })
    }

    fn parse_drop_table(&mut self) -> Result<Statement, String> {
        self.consume(Token::Drop)?;
        self.consume(Token::Table)?;
        let name = self.expect_identifier()?;
        self.skip_trailing_semicolon();
        Ok(Statement::DropTable(DropTableStatement { name }))
    }

    fn skip_trailing_semicolon(&mut self) {
        if *self.current_token() == Token::Semicolon {
            self.advance();
        }
    }

    // Expression grammar, loosest to tightest: OR, AND, NOT, comparison/LIKE.

    fn parse_expression(&mut self) -> Result<Expression, String> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression, String> {
        let mut left = self.parse_and()?;
        while *self.current_token() == Token::Or {
            self.advance();
            let right = self.parse_and()?;
            left = Expression::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, String> {
        let mut left = self.parse_unary()?;
        while *self.current_token() == Token::And {
            self.advance();
            let right = self.parse_unary()?;
            left = Expression::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, String> {
        if *self.current_token() == Token::Not {
            self.advance();
            let expr = self.parse_unary()?;
            return Ok(Expression::UnaryOp {
                op: UnaryOperator::Not,
                expr: Box::new(expr),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expression, String> {
        let left = self.parse_primary()?;
        let op = match self.current_token() {
            Token::Equal => BinaryOperator::Equal,
            Token::NotEqual => BinaryOperator::NotEqual,
            Token::LessThan => BinaryOperator::LessThan,
            Token::LessThanOrEqual => BinaryOperator::LessThanOrEqual,
            Token::GreaterThan => BinaryOperator::GreaterThan,
            Token::GreaterThanOrEqual => BinaryOperator::GreaterThanOrEqual,
            Token::Like => BinaryOperator::Like,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_primary()?;
        Ok(Expression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn parse_primary(&mut self) -> Result<Expression, String> {
        match self.current_token().clone() {
            Token::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.consume(Token::RightParen)?;
                Ok(expr)
            }
            Token::Identifier(name) => {
                self.advance();
                Ok(Expression::Column(name))
            }
            Token::Number(_) | Token::Float(_) | Token::StringLiteral(_) | Token::Null => {
                Ok(Expression::Value(self.parse_literal()?))
            }
            other => Err(format!("expected an expression, found {other:?}")),
        }
    }
}

pub fn parse(tokens: Vec<Token>) -> Result<Statement, String> {
    let mut parser = Parser::new(tokens);
    let stmt = parser.parse_statement()?;
    if *parser.current_token() != Token::Eof {
        return Err(format!(
            "unexpected trailing input starting at {:?}",
            parser.current_token()
        ));
    }
    Ok(stmt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_sql(sql: &str) -> Statement {
        parse(tokenize(sql).unwrap()).unwrap()
    }

    #[test]
    fn parses_create_table() {
        let stmt = parse_sql("CREATE TABLE users (id INT, name TEXT)");
        match stmt {
            Statement::CreateTable(ct) => {
                assert_eq!(ct.name, "users");
                assert_eq!(ct.columns.len(), 2);
                assert_eq!(ct.columns[0].name, "id");
                assert_eq!(ct.columns[0].data_type, DataType::Int);
            }
            _ => panic!("expected CreateTable"),
        }
    }

    #[test]
    fn parses_insert_with_explicit_columns() {
        let stmt = parse_sql("INSERT INTO users (id, name) VALUES (1, 'Alice')");
        match stmt {
            Statement::Insert(ins) => {
                assert_eq!(ins.table, "users");
                assert_eq!(ins.columns, Some(vec!["id".into(), "name".into()]));
                assert_eq!(ins.values, vec![vec![Value::Int(1), Value::Text("Alice".into())]]);
            }
            _ => panic!("expected Insert"),
        }
    }

    #[test]
    fn parses_select_with_where_order_limit_offset() {
        let stmt = parse_sql(
            "SELECT * FROM users WHERE age >= 18 AND name LIKE 'A%' ORDER BY id DESC LIMIT 10 OFFSET 5",
        );
        match stmt {
            Statement::Select(sel) => {
                assert_eq!(sel.columns, vec![Column::All]);
                assert_eq!(sel.from, "users");
                assert!(sel.where_clause.is_some());
                assert_eq!(
                    sel.order_by,
                    Some(vec![OrderByExpr {
                        column: "id".into(),
                        asc: false
                    }])
                );
                assert_eq!(sel.limit, Some(10));
                assert_eq!(sel.offset, Some(5));
            }
            _ => panic!("expected Select"),
        }
    }

    #[test]
    fn parses_update_and_delete() {
        assert!(matches!(
            parse_sql("UPDATE users SET name = 'Bob' WHERE id = 1"),
            Statement::Update(_)
        ));
        assert!(matches!(
            parse_sql("DELETE FROM users WHERE id = 1"),
            Statement::Delete(_)
        ));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(parse(tokenize("SELECT * FROM users EXTRA").unwrap()).is_err());
    }
}
