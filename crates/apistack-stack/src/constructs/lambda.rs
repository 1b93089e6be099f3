//! Functions, their execution role and log group, and invoke permissions.

use std::time::Duration;

use apistack_bundling::DockerImage;
use apistack_core::LogicalId;
use apistack_template::{DeletionPolicy, Pseudo, ResourceDecl, Value};

use super::assets::DirectoryAsset;
use super::{invalid, policy_document};
use crate::builder::{Construct, Handle, StackBuilder};
use crate::error::StackResult;

/// Largest timeout a function may be configured with.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(900);

/// Allowed memory sizes in MB.
pub const MEMORY_RANGE: std::ops::RangeInclusive<u32> = 128..=10_240;

/// Function runtimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    /// Java 11 (Corretto).
    Java11,
}

impl Runtime {
    /// Runtime identifier in the template.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Java11 => "java11",
        }
    }

    /// Image that matches the runtime's build environment.
    #[must_use]
    pub fn bundling_image(&self) -> DockerImage {
        match self {
            Self::Java11 => DockerImage::from_registry("public.ecr.aws/sam/build-java11"),
        }
    }
}

/// How long function logs are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionDays {
    /// One day.
    OneDay,
    /// Three days.
    ThreeDays,
    /// One week.
    OneWeek,
    /// One month.
    OneMonth,
    /// One year.
    OneYear,
    /// Never expire.
    Infinite,
}

impl RetentionDays {
    /// Retention in days, `None` for infinite.
    #[must_use]
    pub fn days(&self) -> Option<u32> {
        match self {
            Self::OneDay => Some(1),
            Self::ThreeDays => Some(3),
            Self::OneWeek => Some(7),
            Self::OneMonth => Some(30),
            Self::OneYear => Some(365),
            Self::Infinite => None,
        }
    }
}

/// Logical ids of the nodes a function expands into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionAttrs {
    /// Execution role.
    pub role: LogicalId,
    /// Log group, if a retention was set.
    pub log_group: Option<LogicalId>,
}

/// A function packaged from a code asset.
///
/// # Examples
///
/// ```no_run
/// # use std::time::Duration;
/// # use apistack_stack::{StackBuilder, constructs::assets::DirectoryAsset};
/// # use apistack_stack::constructs::lambda::{Function, RetentionDays, Runtime};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut stack = StackBuilder::new("Demo", None);
/// let code = stack.add("Code", DirectoryAsset::new("../app/"))?;
/// let function = stack.add(
///     "Handler",
///     Function::new(Runtime::Java11, &code, "example.Handler::handleRequest")
///         .memory_size(512)
///         .timeout(Duration::from_secs(30))
///         .log_retention(RetentionDays::OneDay)
///         .override_logical_id("APILambda")?,
/// )?;
/// assert_eq!(function.id().as_str(), "APILambda");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Function {
    runtime: Runtime,
    code: Handle<DirectoryAsset>,
    handler: String,
    memory_size: u32,
    timeout: Duration,
    log_retention: Option<RetentionDays>,
    logical_id: Option<LogicalId>,
}

impl Function {
    /// A function with 128 MB of memory and a 3 second timeout.
    #[must_use]
    pub fn new(runtime: Runtime, code: &Handle<DirectoryAsset>, handler: impl Into<String>) -> Self {
        Self {
            runtime,
            code: code.clone(),
            handler: handler.into(),
            memory_size: 128,
            timeout: Duration::from_secs(3),
            log_retention: None,
            logical_id: None,
        }
    }

    /// Memory in MB.
    #[must_use]
    pub fn memory_size(mut self, mb: u32) -> Self {
        self.memory_size = mb;
        self
    }

    /// Invocation timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Keep logs for the given period.
    #[must_use]
    pub fn log_retention(mut self, retention: RetentionDays) -> Self {
        self.log_retention = Some(retention);
        self
    }

    /// Pin the function resource's logical id regardless of construct id.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a valid logical id.
    pub fn override_logical_id(mut self, id: &str) -> StackResult<Self> {
        self.logical_id = Some(LogicalId::new(id)?);
        Ok(self)
    }

    fn validate(&self, id: &LogicalId) -> StackResult<()> {
        if !MEMORY_RANGE.contains(&self.memory_size) {
            return Err(invalid(
                id,
                format!("memory size {} MB is outside {MEMORY_RANGE:?}", self.memory_size),
            ));
        }
        if self.timeout.is_zero() || self.timeout > MAX_TIMEOUT {
            return Err(invalid(
                id,
                format!("timeout {:?} must be between 1s and {MAX_TIMEOUT:?}", self.timeout),
            ));
        }
        if self.handler.is_empty() {
            return Err(invalid(id, "handler must not be empty"));
        }
        Ok(())
    }
}

fn execution_role() -> ResourceDecl {
    let assume = Value::map([
        ("Action", Value::str("sts:AssumeRole")),
        ("Effect", Value::str("Allow")),
        (
            "Principal",
            Value::map([("Service", Value::str("lambda.amazonaws.com"))]),
        ),
    ]);
    let basic_execution = Value::join(
        "",
        [
            Value::str("arn:"),
            Value::PseudoRef(Pseudo::Partition),
            Value::str(":iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"),
        ],
    );

    ResourceDecl::new("AWS::IAM::Role")
        .property("AssumeRolePolicyDocument", policy_document(vec![assume]))
        .property("ManagedPolicyArns", Value::list([basic_execution]))
}

impl Construct for Function {
    type Attrs = FunctionAttrs;

    fn declare(self, id: LogicalId, stack: &mut StackBuilder) -> StackResult<(LogicalId, FunctionAttrs)> {
        self.validate(&id)?;
        let function_id = self.logical_id.clone().unwrap_or_else(|| id.clone());

        let role_id = LogicalId::new(format!("{id}ServiceRole"))?;
        stack.declare_resource(role_id.clone(), execution_role())?;

        let location = self.code.attrs();
        let code = Value::map([
            ("S3Bucket", location.bucket_name()),
            ("S3Key", location.object_key_value()),
        ]);
        // Both values are checked by `validate`.
        let timeout = u32::try_from(self.timeout.as_secs()).unwrap_or(u32::MAX);

        let function = ResourceDecl::new("AWS::Lambda::Function")
            .property("Code", code)
            .property("Handler", self.handler.as_str())
            .property("MemorySize", self.memory_size)
            .property("Role", Value::get_att(&role_id, "Arn"))
            .property("Runtime", self.runtime.name())
            .property("Timeout", timeout)
            .depends_on(&role_id);
        stack.declare_resource_after(function_id.clone(), function, &[self.code.id()])?;

        let log_group = match self.log_retention {
            Some(retention) => {
                let log_group_id = LogicalId::new(format!("{id}LogGroup"))?;
                let name = Value::join(
                    "",
                    [Value::str("/aws/lambda/"), Value::reference(&function_id)],
                );
                let decl = ResourceDecl::new("AWS::Logs::LogGroup")
                    .property("LogGroupName", name)
                    .property_opt("RetentionInDays", retention.days().map(Value::from))
                    .deletion_policy(DeletionPolicy::Retain)
                    .update_replace_policy(DeletionPolicy::Retain);
                stack.declare_resource(log_group_id.clone(), decl)?;
                Some(log_group_id)
            }
            None => None,
        };

        Ok((
            function_id,
            FunctionAttrs {
                role: role_id,
                log_group,
            },
        ))
    }
}

impl Handle<Function> {
    /// Function ARN.
    #[must_use]
    pub fn arn(&self) -> Value {
        Value::get_att(self.id(), "Arn")
    }

    /// Allow `principal` to invoke the function.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is invalid or already declared.
    pub fn add_permission(
        &self,
        stack: &mut StackBuilder,
        id: &str,
        principal: impl Into<String>,
    ) -> StackResult<Handle<Permission>> {
        stack.add(
            id,
            Permission {
                function: self.clone(),
                principal: principal.into(),
            },
        )
    }
}

/// `lambda:InvokeFunction` granted to a service principal.
#[derive(Debug, Clone)]
pub struct Permission {
    function: Handle<Function>,
    principal: String,
}

impl Construct for Permission {
    type Attrs = ();

    fn declare(self, id: LogicalId, stack: &mut StackBuilder) -> StackResult<(LogicalId, ())> {
        let decl = ResourceDecl::new("AWS::Lambda::Permission")
            .property("Action", "lambda:InvokeFunction")
            .property("FunctionName", self.function.arn())
            .property("Principal", self.principal);
        stack.declare_resource(id.clone(), decl)?;
        Ok((id, ()))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::error::StackError;

    fn code(stack: &mut StackBuilder, dir: &std::path::Path) -> Handle<DirectoryAsset> {
        fs::write(dir.join("pom.xml"), "<project/>").unwrap();
        stack.add("Code", DirectoryAsset::new(dir)).unwrap()
    }

    #[test]
    fn test_should_pin_function_logical_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut stack = StackBuilder::new("Test", None);
        let code = code(&mut stack, dir.path());

        let function = stack
            .add(
                "OpenAPIBlogLambda",
                Function::new(Runtime::Java11, &code, "Handler::handle")
                    .memory_size(512)
                    .timeout(Duration::from_secs(30))
                    .log_retention(RetentionDays::OneDay)
                    .override_logical_id("APILambda")
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(function.id().as_str(), "APILambda");
        assert_eq!(function.attrs().role.as_str(), "OpenAPIBlogLambdaServiceRole");

        let declared = stack.finish().unwrap();
        let decl = declared.template.resource("APILambda").unwrap();
        assert_eq!(decl.get("Runtime"), Some(&Value::str("java11")));
        assert_eq!(decl.get("MemorySize"), Some(&Value::Number(512)));
        assert_eq!(decl.get("Timeout"), Some(&Value::Number(30)));
        assert!(declared.template.resource("OpenAPIBlogLambda").is_none());

        let log_group = declared.template.resource("OpenAPIBlogLambdaLogGroup").unwrap();
        assert_eq!(log_group.get("RetentionInDays"), Some(&Value::Number(1)));
        assert!(declared.graph.depends_on_transitively(
            &LogicalId::new("OpenAPIBlogLambdaLogGroup").unwrap(),
            &LogicalId::new("Code").unwrap()
        ));
    }

    #[test]
    fn test_should_declare_invoke_permission() {
        let dir = tempfile::tempdir().unwrap();
        let mut stack = StackBuilder::new("Test", None);
        let code = code(&mut stack, dir.path());
        let function = stack
            .add("Fn", Function::new(Runtime::Java11, &code, "Handler::handle"))
            .unwrap();
        function
            .add_permission(&mut stack, "FnApiPermission", "apigateway.amazonaws.com")
            .unwrap();

        let declared = stack.finish().unwrap();
        let permission = declared.template.resource("FnApiPermission").unwrap();
        assert_eq!(permission.get("Principal"), Some(&Value::str("apigateway.amazonaws.com")));
        assert_eq!(permission.get("FunctionName"), Some(&function.arn()));
    }

    #[test]
    fn test_should_reject_out_of_range_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut stack = StackBuilder::new("Test", None);
        let code = code(&mut stack, dir.path());

        let err = stack
            .add(
                "Fn",
                Function::new(Runtime::Java11, &code, "H::h").timeout(Duration::from_secs(901)),
            )
            .unwrap_err();
        assert!(matches!(err, StackError::InvalidConstruct { .. }));

        let err = stack
            .add("Fn", Function::new(Runtime::Java11, &code, "H::h").memory_size(64))
            .unwrap_err();
        assert!(matches!(err, StackError::InvalidConstruct { .. }));
    }
}
